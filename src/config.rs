/// Pipeline configuration
///
/// Built once at startup (defaults, then an optional JSON file, then CLI
/// overrides) and passed by reference to every component.
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::corpus::{LAPTOP_ENTITIES, POLARITIES, RESTAURANT_ASPECTS, RESTAURANT_ENTITIES};
use crate::training::TrainingConfig;
use crate::FosaError;

/// Which sub-problem a model instance is trained for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Focus {
    /// Which entity (or aspect) the sentence is about
    Feature,
    /// Which sentiment the sentence carries
    Polarity,
}

impl Focus {
    /// Both foci, in the order they are trained and predicted
    pub const ALL: [Focus; 2] = [Focus::Feature, Focus::Polarity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Focus::Feature => "feature",
            Focus::Polarity => "polarity",
        }
    }

    /// Name of the per-model directory inside a run
    pub fn model_dir_name(&self) -> String {
        format!("CNN_{}", self.as_str())
    }
}

impl FromStr for Focus {
    type Err = FosaError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "feature" => Ok(Focus::Feature),
            "polarity" => Ok(Focus::Polarity),
            other => Err(FosaError::Config(format!(
                "'focus' parameter must be 'feature' or 'polarity', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Focus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review domain of the SemEval corpus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Restaurant,
    Laptop,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Restaurant => "RESTAURANT",
            Domain::Laptop => "LAPTOP",
        }
    }

    /// Feature class names for this domain
    ///
    /// Aspects (`ENTITY#ATTRIBUTE`) only exist for restaurants; the laptop
    /// domain always uses entities.
    pub fn feature_labels(&self, aspects: bool) -> &'static [&'static str] {
        match (self, aspects) {
            (Domain::Restaurant, true) => RESTAURANT_ASPECTS,
            (Domain::Restaurant, false) => RESTAURANT_ENTITIES,
            (Domain::Laptop, _) => LAPTOP_ENTITIES,
        }
    }

    /// Class names for a focus
    pub fn labels(&self, focus: Focus, aspects: bool) -> &'static [&'static str] {
        match focus {
            Focus::Feature => self.feature_labels(aspects),
            Focus::Polarity => POLARITIES,
        }
    }
}

impl FromStr for Domain {
    type Err = FosaError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "RESTAURANT" => Ok(Domain::Restaurant),
            "LAPTOP" => Ok(Domain::Laptop),
            other => Err(FosaError::Config(format!(
                "The 'current_domain' parameter must be 'RESTAURANT' or 'LAPTOP', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset selection and train/dev split
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Dataset name; only "semeval" is known
    pub dataset: String,
    /// "RESTAURANT" or "LAPTOP"
    pub current_domain: String,
    /// Root of the SemEval Subtask 1 corpus
    pub semeval_folder: PathBuf,
    /// Widen restaurant features from entities to `ENTITY#ATTRIBUTE` aspects
    pub aspects: bool,
    /// Fraction of the training corpus held out for evaluation
    pub dev_sample_percentage: f64,
    /// Seed for the train/dev shuffle and per-epoch shuffles
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset: "semeval".to_string(),
            current_domain: "RESTAURANT".to_string(),
            semeval_folder: PathBuf::from("../data/SemEval/Subtask1"),
            aspects: false,
            dev_sample_percentage: 0.1,
            seed: 10,
        }
    }
}

impl DataConfig {
    /// Parsed current domain
    pub fn domain(&self) -> crate::Result<Domain> {
        self.current_domain.parse()
    }

    /// Whether features are full aspects; only the restaurant domain has them
    pub fn effective_aspects(&self) -> crate::Result<bool> {
        Ok(self.aspects && self.domain()? == Domain::Restaurant)
    }

    /// Training corpus of the current domain
    pub fn train_path(&self) -> crate::Result<PathBuf> {
        let dir = self.semeval_folder.join(self.domain_dir()?);
        Ok(dir.join("train.json"))
    }

    /// Gold test corpus of the current domain
    pub fn test_path(&self) -> crate::Result<PathBuf> {
        let dir = self.semeval_folder.join(self.domain_dir()?);
        Ok(dir.join("test").join("test_gold.json"))
    }

    fn domain_dir(&self) -> crate::Result<&'static str> {
        Ok(match self.domain()? {
            Domain::Restaurant => "restaurant",
            Domain::Laptop => "laptop",
        })
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.dataset != "semeval" {
            return Err(FosaError::Config(format!(
                "Unknown dataset '{}'. Only 'semeval' is supported",
                self.dataset
            )));
        }

        let domain = self.domain()?;
        if self.aspects && domain == Domain::Laptop {
            log::warn!("'aspects' has no effect on the LAPTOP domain, entities are used");
        }

        if !(0.0..1.0).contains(&self.dev_sample_percentage) {
            return Err(FosaError::Config(
                "dev_sample_percentage must be in [0, 1)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Text CNN hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Embedding size when no pretrained vectors are used
    pub embedding_dim: usize,
    /// Convolution window sizes, one filter bank per size
    pub filter_sizes: Vec<usize>,
    /// Filters per window size
    pub num_filters: usize,
    /// Keep probability of the dropout before the output layer
    pub dropout_keep_prob: f64,
    /// L2 penalty on the output layer
    pub l2_reg_lambda: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 128,
            filter_sizes: vec![3, 4, 5],
            num_filters: 128,
            dropout_keep_prob: 0.5,
            l2_reg_lambda: 0.0,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.embedding_dim == 0 || self.num_filters == 0 {
            return Err(FosaError::Config(
                "embedding_dim and num_filters must be > 0".to_string(),
            ));
        }

        if self.filter_sizes.is_empty() || self.filter_sizes.contains(&0) {
            return Err(FosaError::Config(
                "filter_sizes must be a non-empty list of positive sizes".to_string(),
            ));
        }

        if !(self.dropout_keep_prob > 0.0 && self.dropout_keep_prob <= 1.0) {
            return Err(FosaError::Config(
                "dropout_keep_prob must be in (0, 1]".to_string(),
            ));
        }

        if self.l2_reg_lambda < 0.0 {
            return Err(FosaError::Config("l2_reg_lambda must be >= 0".to_string()));
        }

        Ok(())
    }

    /// Largest convolution window
    pub fn max_filter_size(&self) -> usize {
        self.filter_sizes.iter().copied().max().unwrap_or(1)
    }
}

/// File format of pretrained word vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    Glove,
    Word2vec,
}

impl fmt::Display for EmbeddingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingKind::Glove => f.write_str("glove"),
            EmbeddingKind::Word2vec => f.write_str("word2vec"),
        }
    }
}

/// Optional pretrained word vectors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub enabled: bool,
    pub kind: Option<EmbeddingKind>,
    pub path: Option<PathBuf>,
    /// Dimension of the vectors in `path`
    pub dimension: usize,
    /// `path` is a word2vec binary file
    pub binary: bool,
}

impl EmbeddingsConfig {
    /// Pretrained source, when enabled and fully described
    pub fn source(&self) -> Option<(EmbeddingKind, &Path)> {
        if !self.enabled {
            return None;
        }
        match (self.kind, self.path.as_deref()) {
            (Some(kind), Some(path)) => Some((kind, path)),
            _ => None,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.enabled && self.kind.is_some() {
            if self.path.is_none() {
                return Err(FosaError::Config(
                    "embeddings.path is required when pretrained embeddings are enabled".to_string(),
                ));
            }
            if self.dimension == 0 {
                return Err(FosaError::Config(
                    "embeddings.dimension must be > 0".to_string(),
                ));
            }
            if self.binary && self.kind != Some(EmbeddingKind::Word2vec) {
                return Err(FosaError::Config(
                    "embeddings.binary is only supported for word2vec".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Where run artifacts are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub run_directory: PathBuf,
    /// Runs are stored at `run_directory/directory_name/<timestamp>`
    pub directory_name: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_directory: PathBuf::from("runs"),
            directory_name: "current".to_string(),
        }
    }
}

/// Whole pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub embeddings: EmbeddingsConfig,
    pub run: RunConfig,
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.data.validate()?;
        self.model.validate()?;
        self.training.validate()?;
        self.embeddings.validate()?;
        Ok(())
    }

    /// Embedding size actually used by the network
    pub fn embedding_dim(&self) -> usize {
        match self.embeddings.source() {
            Some(_) => self.embeddings.dimension,
            None => self.model.embedding_dim,
        }
    }
}
