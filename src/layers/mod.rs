/// Neural network layer primitives
///
/// Building blocks of the text CNN:
/// - Word embeddings (random or pretrained)
/// - Convolution with max-over-time pooling

pub mod conv;
pub mod embeddings;

pub use conv::ConvMaxPool;
pub use embeddings::WordEmbedding;
