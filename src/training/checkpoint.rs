/// Step-numbered checkpoints with bounded retention
///
/// Layout inside the checkpoint directory:
/// - `model-<step>.safetensors` - classifier parameters
/// - `model-<step>.json` - [`CheckpointMetadata`]
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Classifier;
use crate::FosaError;

const PREFIX: &str = "model-";
const WEIGHTS_EXTENSION: &str = "safetensors";

/// Checkpoint metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Training step
    pub step: usize,
    /// Learning rate of the step
    pub lr: f64,
    /// Train loss of the step
    pub loss: f64,
    /// Train accuracy of the step
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

impl CheckpointMetadata {
    pub fn new(step: usize, lr: f64, loss: f64, accuracy: f64) -> Self {
        Self {
            step,
            lr,
            loss,
            accuracy,
            timestamp: Utc::now(),
        }
    }
}

/// A checkpoint on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub step: usize,
    pub weights_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl Checkpoint {
    fn at(dir: &Path, step: usize) -> Self {
        Self {
            step,
            weights_path: dir.join(format!("{}{}.{}", PREFIX, step, WEIGHTS_EXTENSION)),
            metadata_path: dir.join(format!("{}{}.json", PREFIX, step)),
        }
    }

    /// Read the metadata written next to the weights
    pub fn metadata(&self) -> crate::Result<CheckpointMetadata> {
        let json = fs::read_to_string(&self.metadata_path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Parse `<step>` out of `model-<step>.safetensors`
fn step_from_file_name(path: &Path) -> Option<usize> {
    if path.extension()?.to_str()? != WEIGHTS_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.strip_prefix(PREFIX)?.parse().ok()
}

/// Writes checkpoints and keeps the newest `max_to_keep`
pub struct CheckpointManager {
    dir: PathBuf,
    max_to_keep: usize,
}

impl CheckpointManager {
    /// Create new manager, creating the directory if needed
    pub fn new<P: Into<PathBuf>>(dir: P, max_to_keep: usize) -> crate::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_to_keep })
    }

    /// Open an existing checkpoint directory for reading
    pub fn open<P: Into<PathBuf>>(dir: P) -> crate::Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(FosaError::Checkpoint(format!(
                "Checkpoint directory {:?} does not exist",
                dir
            )));
        }
        Ok(Self {
            dir,
            max_to_keep: usize::MAX,
        })
    }

    /// Save the classifier at `metadata.step`, then evict the oldest checkpoints
    pub fn save<C: Classifier + ?Sized>(
        &self,
        classifier: &C,
        metadata: &CheckpointMetadata,
    ) -> crate::Result<Checkpoint> {
        let checkpoint = Checkpoint::at(&self.dir, metadata.step);

        classifier.save(&checkpoint.weights_path)?;
        fs::write(&checkpoint.metadata_path, serde_json::to_string_pretty(metadata)?)?;

        log::info!("Saved model checkpoint to {:?}", checkpoint.weights_path);

        self.cleanup_old_checkpoints()?;
        Ok(checkpoint)
    }

    /// All checkpoints, oldest step first
    pub fn list(&self) -> crate::Result<Vec<Checkpoint>> {
        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if let Some(step) = step_from_file_name(&path) {
                checkpoints.push(Checkpoint::at(&self.dir, step));
            }
        }
        checkpoints.sort_by_key(|checkpoint| checkpoint.step);
        Ok(checkpoints)
    }

    /// Checkpoint with the highest step
    pub fn latest(&self) -> crate::Result<Checkpoint> {
        self.list()?.pop().ok_or_else(|| {
            FosaError::Checkpoint(format!("No checkpoint found in {:?}", self.dir))
        })
    }

    fn cleanup_old_checkpoints(&self) -> crate::Result<()> {
        let checkpoints = self.list()?;
        if checkpoints.len() <= self.max_to_keep {
            return Ok(());
        }

        let excess = checkpoints.len() - self.max_to_keep;
        for checkpoint in &checkpoints[..excess] {
            log::debug!("Removing checkpoint {}", checkpoint.step);
            fs::remove_file(&checkpoint.weights_path)?;
            if checkpoint.metadata_path.exists() {
                fs::remove_file(&checkpoint.metadata_path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Prediction, StepMetrics};

    /// Writes its id so reloads can be checked
    struct FileClassifier {
        id: String,
    }

    impl Classifier for FileClassifier {
        fn train_step(&mut self, _: &[Vec<u32>], _: &[usize], _: f64, _: f64) -> crate::Result<StepMetrics> {
            Ok(StepMetrics::default())
        }

        fn evaluate(&self, _: &[Vec<u32>], _: &[usize]) -> crate::Result<StepMetrics> {
            Ok(StepMetrics::default())
        }

        fn predict_batch(&self, _: &[Vec<u32>]) -> crate::Result<Vec<Prediction>> {
            Ok(Vec::new())
        }

        fn save(&self, path: &Path) -> crate::Result<()> {
            fs::write(path, &self.id)?;
            Ok(())
        }

        fn load(&mut self, path: &Path) -> crate::Result<()> {
            self.id = fs::read_to_string(path)?;
            Ok(())
        }
    }

    #[test]
    fn test_step_from_file_name() {
        assert_eq!(step_from_file_name(Path::new("model-300.safetensors")), Some(300));
        assert_eq!(step_from_file_name(Path::new("model-300.json")), None);
        assert_eq!(step_from_file_name(Path::new("other-3.safetensors")), None);
    }

    #[test]
    fn test_retention_keeps_most_recent() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = CheckpointManager::new(dir.path().join("checkpoints"), 3)?;
        let classifier = FileClassifier { id: "cnn".to_string() };

        for step in (100..=700).step_by(100) {
            manager.save(&classifier, &CheckpointMetadata::new(step, 0.001, 0.5, 0.8))?;
        }

        let steps: Vec<usize> = manager.list()?.iter().map(|c| c.step).collect();
        assert_eq!(steps, vec![500, 600, 700]);
        assert!(!dir.path().join("checkpoints/model-400.json").exists());
        Ok(())
    }

    #[test]
    fn test_latest_and_metadata() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = CheckpointManager::new(dir.path(), 5)?;
        let classifier = FileClassifier { id: "a".to_string() };

        manager.save(&classifier, &CheckpointMetadata::new(20, 0.004, 0.9, 0.5))?;
        manager.save(&classifier, &CheckpointMetadata::new(100, 0.002, 0.4, 0.75))?;

        let latest = CheckpointManager::open(dir.path())?.latest()?;
        assert_eq!(latest.step, 100);

        let metadata = latest.metadata()?;
        assert_eq!(metadata.step, 100);
        assert!((metadata.accuracy - 0.75).abs() < 1e-12);

        let mut restored = FileClassifier { id: String::new() };
        restored.load(&latest.weights_path)?;
        assert_eq!(restored.id, "a");
        Ok(())
    }

    #[test]
    fn test_metadata_timestamp_survives_json() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let manager = CheckpointManager::new(dir.path(), 1)?;
        let metadata = CheckpointMetadata::new(7, 0.003, 1.2, 0.25);

        let checkpoint = manager.save(&FileClassifier { id: "t".to_string() }, &metadata)?;

        assert_eq!(checkpoint.metadata()?, metadata);
        Ok(())
    }

    #[test]
    fn test_missing_directory_and_empty_directory() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let missing = CheckpointManager::open(dir.path().join("nope"));
        assert!(matches!(missing, Err(FosaError::Checkpoint(_))));

        let empty = CheckpointManager::open(dir.path())?;
        assert!(matches!(empty.latest(), Err(FosaError::Checkpoint(_))));
        Ok(())
    }
}
