/// Training loop for sentence classifiers
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::checkpoint::{Checkpoint, CheckpointManager, CheckpointMetadata};
use super::scheduler::{ExponentialDecayConfig, ExponentialDecayScheduler};
use super::summary::{NullSummaryWriter, SummaryRecord, SummaryWriter};
use crate::data::{batches_per_epoch, unzip_batch, BatchIter, Example};
use crate::models::{Classifier, StepMetrics};
use crate::FosaError;

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Batch size
    pub batch_size: usize,
    /// Number of training epochs
    pub num_epochs: usize,
    /// Evaluate on the dev set every N steps
    pub evaluate_every: usize,
    /// Save checkpoint every N steps
    pub checkpoint_every: usize,
    /// Number of checkpoints to keep
    pub num_checkpoints: usize,
    /// Learning rate at step 0
    pub max_learning_rate: f64,
    /// Asymptotic learning rate
    pub min_learning_rate: f64,
    /// Scales how many epochs the learning rate takes to decay
    pub decay_coefficient: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            num_epochs: 200,
            evaluate_every: 100,
            checkpoint_every: 100,
            num_checkpoints: 5,
            max_learning_rate: 0.005,
            min_learning_rate: 0.0001,
            decay_coefficient: 2.5,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 || self.num_epochs == 0 {
            return Err(FosaError::Config(
                "batch_size and num_epochs must be > 0".to_string(),
            ));
        }

        if self.evaluate_every == 0 || self.checkpoint_every == 0 || self.num_checkpoints == 0 {
            return Err(FosaError::Config(
                "evaluate_every, checkpoint_every and num_checkpoints must be > 0".to_string(),
            ));
        }

        if !(self.max_learning_rate > self.min_learning_rate && self.min_learning_rate >= 0.0) {
            return Err(FosaError::Config(format!(
                "Learning rate bounds must satisfy max > min >= 0, got max={} min={}",
                self.max_learning_rate, self.min_learning_rate
            )));
        }

        if self.decay_coefficient <= 0.0 {
            return Err(FosaError::Config("decay_coefficient must be > 0".to_string()));
        }

        Ok(())
    }

    /// Total optimisation steps for a training set of `num_examples`
    pub fn total_steps(&self, num_examples: usize) -> usize {
        self.num_epochs * batches_per_epoch(num_examples, self.batch_size)
    }
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Initialized,
    Running,
    Evaluating,
    Checkpointing,
    Done,
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub total_steps: usize,
    /// Metrics of the last train step
    pub final_train: StepMetrics,
    /// Metrics of the last dev evaluation, if any ran
    pub last_dev: Option<StepMetrics>,
    /// Checkpoints in the order they were written
    pub checkpoints: Vec<Checkpoint>,
}

/// `100 * step / total_steps`, rounded to two decimals
pub fn progress_percentage(step: usize, total_steps: usize) -> f64 {
    if total_steps == 0 {
        return 100.0;
    }
    (10_000.0 * step as f64 / total_steps as f64).round() / 100.0
}

/// Drives a classifier through the batches of a training set
pub struct Trainer<C: Classifier> {
    classifier: C,
    config: TrainingConfig,
    dropout_keep_prob: f64,
    checkpoints: Option<CheckpointManager>,
    train_summary: Box<dyn SummaryWriter>,
    dev_summary: Box<dyn SummaryWriter>,
    state: TrainerState,
    step: usize,
}

impl<C: Classifier> Trainer<C> {
    /// Create new trainer
    pub fn new(classifier: C, config: TrainingConfig, dropout_keep_prob: f64) -> Self {
        Self {
            classifier,
            config,
            dropout_keep_prob,
            checkpoints: None,
            train_summary: Box::new(NullSummaryWriter),
            dev_summary: Box::new(NullSummaryWriter),
            state: TrainerState::Initialized,
            step: 0,
        }
    }

    /// Persist checkpoints through `manager`
    pub fn with_checkpoints(mut self, manager: CheckpointManager) -> Self {
        self.checkpoints = Some(manager);
        self
    }

    /// Record train steps and dev evaluations
    pub fn with_summaries(
        mut self,
        train_summary: Box<dyn SummaryWriter>,
        dev_summary: Box<dyn SummaryWriter>,
    ) -> Self {
        self.train_summary = train_summary;
        self.dev_summary = dev_summary;
        self
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn into_classifier(self) -> C {
        self.classifier
    }

    /// Full training loop
    ///
    /// # Arguments
    /// * `train` - Training examples, reshuffled every epoch
    /// * `dev` - Held-out examples for periodic evaluation
    /// * `rng` - Random source of the per-epoch permutations
    pub fn train<R: Rng>(
        &mut self,
        train: &[Example],
        dev: &[Example],
        rng: R,
    ) -> crate::Result<TrainingReport> {
        self.config.validate()?;
        if self.state != TrainerState::Initialized {
            return Err(FosaError::Config("Trainer has already run".to_string()));
        }
        if train.is_empty() {
            return Err(FosaError::Data("Training set is empty".to_string()));
        }

        let total_steps = self.config.total_steps(train.len());
        let mut scheduler = ExponentialDecayScheduler::new(ExponentialDecayConfig::from_dataset(
            self.config.max_learning_rate,
            self.config.min_learning_rate,
            self.config.decay_coefficient,
            train.len(),
            self.config.batch_size,
        ));

        log::info!(
            "Training on {} examples, evaluating on {}: {} epochs, {} steps",
            train.len(),
            dev.len(),
            self.config.num_epochs,
            total_steps
        );
        if dev.is_empty() {
            log::warn!("Dev set is empty, evaluation will be skipped");
        }

        let mut report = TrainingReport {
            total_steps,
            final_train: StepMetrics::default(),
            last_dev: None,
            checkpoints: Vec::new(),
        };

        self.state = TrainerState::Running;
        let batches = BatchIter::new(train, self.config.batch_size, self.config.num_epochs, true, rng);

        for batch in batches {
            let (inputs, labels) = unzip_batch(&batch);

            let lr = scheduler.get_lr();
            let metrics = self
                .classifier
                .train_step(&inputs, &labels, lr, self.dropout_keep_prob)?;
            scheduler.step();
            self.step += 1;

            log::info!(
                "step {}, loss {:.4}, acc {:.4}, learning_rate {:.6}",
                self.step,
                metrics.loss,
                metrics.accuracy,
                lr
            );
            self.train_summary.record(&SummaryRecord::new(
                self.step,
                metrics.loss,
                metrics.accuracy,
                Some(lr),
            ))?;
            report.final_train = metrics;

            let last_step = self.step == total_steps;

            if self.step % self.config.evaluate_every == 0 || last_step {
                self.state = TrainerState::Evaluating;
                if let Some(dev_metrics) = self.evaluate(dev)? {
                    report.last_dev = Some(dev_metrics);
                }
                self.state = TrainerState::Running;
            }

            if self.step % self.config.checkpoint_every == 0 || last_step {
                self.state = TrainerState::Checkpointing;
                if let Some(manager) = &self.checkpoints {
                    let metadata = CheckpointMetadata::new(self.step, lr, metrics.loss, metrics.accuracy);
                    report.checkpoints.push(manager.save(&self.classifier, &metadata)?);
                }
                self.state = TrainerState::Running;
            }

            let progress = progress_percentage(self.step, total_steps);
            log::info!("Progress: {:.2}%", progress);
            if progress >= 100.0 {
                log::info!("Training complete after {} steps", self.step);
            }
        }

        self.state = TrainerState::Done;
        Ok(report)
    }

    /// Evaluate on `dev` with dropout disabled; `None` when `dev` is empty
    fn evaluate(&mut self, dev: &[Example]) -> crate::Result<Option<StepMetrics>> {
        if dev.is_empty() {
            return Ok(None);
        }

        // Batch-size weighted means over non-shuffled batches
        let mut loss = 0.0;
        let mut accuracy = 0.0;
        for batch in BatchIter::sequential(dev, self.config.batch_size, 1) {
            let (inputs, labels) = unzip_batch(&batch);
            let metrics = self.classifier.evaluate(&inputs, &labels)?;
            loss += metrics.loss * batch.len() as f64;
            accuracy += metrics.accuracy * batch.len() as f64;
        }
        let metrics = StepMetrics {
            loss: loss / dev.len() as f64,
            accuracy: accuracy / dev.len() as f64,
        };

        log::info!(
            "Evaluation at step {}: loss {:.4}, acc {:.4}",
            self.step,
            metrics.loss,
            metrics.accuracy
        );
        self.dev_summary
            .record(&SummaryRecord::new(self.step, metrics.loss, metrics.accuracy, None))?;

        Ok(Some(metrics))
    }
}
