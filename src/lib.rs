//! fosa - aspect and polarity classification of review sentences
//!
//! Two text CNNs are trained per run: one predicts which feature (entity or
//! aspect) a sentence talks about, the other which polarity it carries. Their
//! predictions on the test corpus are then joined into a single
//! (feature, polarity) score.
//!
//! # Layout
//!
//! - [`data`]: corpus loading, vocabulary, pretrained embeddings, batching
//! - [`models`]: the [`Classifier`] seam and the candle [`TextCnn`]
//! - [`training`]: learning-rate decay, checkpoints, summaries, training loop
//! - [`eval`]: per-model prediction, metrics and the joint aggregation
//!
//! # Example
//!
//! ```ignore
//! use fosa::{PipelineConfig, Focus};
//!
//! let config = PipelineConfig::default();
//! let report = fosa::pipeline::train_focus(&config, Focus::Feature, &run_dir)?;
//! ```

pub mod config;
pub mod data;
pub mod eval;
pub mod layers;
pub mod models;
pub mod pipeline;
pub mod training;

// Re-export commonly used items
pub use config::{Domain, Focus, PipelineConfig};
pub use models::{CnnClassifier, Classifier, TextCnn, TextCnnConfig};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum FosaError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Lookup error: {0}")]
    Lookup(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, FosaError>;
