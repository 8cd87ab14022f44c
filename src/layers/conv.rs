/// Convolution + max-over-time pooling over embedded sentences
use candle_core::{Module, Result, Tensor, D};
use candle_nn::{Conv1d, Conv1dConfig, Init, VarBuilder};

/// One filter bank of the text CNN
///
/// Slides `num_filters` windows of `filter_size` tokens over the sentence,
/// applies ReLU and keeps the maximum activation of each filter.
pub struct ConvMaxPool {
    conv: Conv1d,
    filter_size: usize,
}

impl ConvMaxPool {
    /// Create new filter bank
    ///
    /// # Arguments
    /// * `embedding_dim` - Input channels (embedding size)
    /// * `num_filters` - Output channels
    /// * `filter_size` - Window width in tokens
    /// * `vb` - VarBuilder for parameter initialization
    pub fn new(
        embedding_dim: usize,
        num_filters: usize,
        filter_size: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let weight = vb.get_with_hints(
            (num_filters, embedding_dim, filter_size),
            "weight",
            Init::Randn { mean: 0.0, stdev: 0.1 },
        )?;
        let bias = vb.get_with_hints(num_filters, "bias", Init::Const(0.1))?;
        let conv = Conv1d::new(weight, Some(bias), Conv1dConfig::default());

        Ok(Self { conv, filter_size })
    }

    pub fn filter_size(&self) -> usize {
        self.filter_size
    }

    /// `[batch, embedding_dim, seq_len]` to `[batch, num_filters]`
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.conv.forward(xs)?.relu()?.max(D::Minus1)
    }
}
