/// Word embedding layer
use candle_core::{Module, Result, Tensor};
use candle_nn::{Embedding, Init, VarBuilder};

/// Token embedding initialised uniformly in [-1, 1]
///
/// The weight lives under `<prefix>.weight` so pretrained vectors can be
/// written over it through the owning `VarMap`.
pub struct WordEmbedding {
    embedding: Embedding,
}

impl WordEmbedding {
    pub fn new(vocab_size: usize, embedding_dim: usize, vb: VarBuilder) -> Result<Self> {
        let init = Init::Uniform { lo: -1.0, up: 1.0 };
        let weight = vb.get_with_hints((vocab_size, embedding_dim), "weight", init)?;
        Ok(Self {
            embedding: Embedding::new(weight, embedding_dim),
        })
    }

    /// `[batch, seq_len]` ids to `[batch, seq_len, embedding_dim]`
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.embedding.forward(input)
    }

    pub fn weight(&self) -> &Tensor {
        self.embedding.embeddings()
    }
}
