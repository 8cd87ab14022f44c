/// Sentence classifiers
///
/// The training loop and the prediction runner only see the [`Classifier`]
/// trait; [`CnnClassifier`] is the candle implementation.
use std::path::Path;

pub mod text_cnn;

pub use text_cnn::{CnnClassifier, TextCnn, TextCnnConfig};

/// Loss and accuracy of one forward pass over a batch
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepMetrics {
    pub loss: f64,
    pub accuracy: f64,
}

/// Prediction for one sentence
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the highest score
    pub class_index: usize,
    /// Raw (pre-softmax) scores, one per class
    pub scores: Vec<f32>,
}

/// A trainable classifier over encoded sentences
///
/// Inputs are padded token id sequences, labels are class indices.
pub trait Classifier {
    /// One optimisation update; returns the metrics of the batch before the update
    fn train_step(
        &mut self,
        inputs: &[Vec<u32>],
        labels: &[usize],
        learning_rate: f64,
        dropout_keep_prob: f64,
    ) -> crate::Result<StepMetrics>;

    /// Loss and accuracy with dropout disabled
    fn evaluate(&self, inputs: &[Vec<u32>], labels: &[usize]) -> crate::Result<StepMetrics>;

    /// Predicted class and raw scores per input
    fn predict_batch(&self, inputs: &[Vec<u32>]) -> crate::Result<Vec<Prediction>>;

    /// Write a parameter snapshot
    fn save(&self, path: &Path) -> crate::Result<()>;

    /// Restore a parameter snapshot written by [`Classifier::save`]
    fn load(&mut self, path: &Path) -> crate::Result<()>;
}
