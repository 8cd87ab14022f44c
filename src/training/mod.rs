/// Training infrastructure for the sentence classifiers
pub mod checkpoint;
pub mod scheduler;
pub mod summary;
pub mod trainer;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointMetadata};
pub use scheduler::{ExponentialDecayConfig, ExponentialDecayScheduler};
pub use summary::{CsvSummaryWriter, NullSummaryWriter, SummaryRecord, SummaryWriter};
pub use trainer::{progress_percentage, Trainer, TrainerState, TrainingConfig, TrainingReport};
