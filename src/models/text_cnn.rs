/// Convolutional sentence classifier
///
/// embedding -> one conv/max-pool bank per filter size -> concat -> dropout
/// -> linear scores. Trained with softmax cross-entropy and Adam.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{loss, AdamW, Linear, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};

use super::{Classifier, Prediction, StepMetrics};
use crate::data::EmbeddingMatrix;
use crate::layers::{ConvMaxPool, WordEmbedding};
use crate::FosaError;

/// Name of the embedding weight inside the `VarMap`
const EMBEDDING_WEIGHT: &str = "embedding.weight";

/// Shape of a text CNN, persisted next to the vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCnnConfig {
    /// Padded sentence length in tokens
    pub sequence_length: usize,
    pub num_classes: usize,
    pub vocab_size: usize,
    pub embedding_dim: usize,
    pub filter_sizes: Vec<usize>,
    /// Filters per filter size
    pub num_filters: usize,
    pub l2_reg_lambda: f64,
}

impl TextCnnConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.num_classes == 0 || self.vocab_size == 0 || self.embedding_dim == 0 {
            return Err(FosaError::Config(
                "num_classes, vocab_size and embedding_dim must be > 0".to_string(),
            ));
        }

        let widest = self.filter_sizes.iter().copied().max().unwrap_or(0);
        if widest == 0 || self.num_filters == 0 {
            return Err(FosaError::Config(
                "at least one filter size and one filter are required".to_string(),
            ));
        }

        if self.sequence_length < widest {
            return Err(FosaError::Config(format!(
                "sequence_length {} is shorter than the widest filter {}",
                self.sequence_length, widest
            )));
        }

        Ok(())
    }

    /// Width of the pooled feature vector
    pub fn num_filters_total(&self) -> usize {
        self.num_filters * self.filter_sizes.len()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Text CNN network
pub struct TextCnn {
    embedding: WordEmbedding,
    convs: Vec<ConvMaxPool>,
    output: Linear,
    l2_reg_lambda: f64,
}

impl TextCnn {
    /// Create new network
    pub fn new(config: &TextCnnConfig, vb: VarBuilder) -> crate::Result<Self> {
        config.validate()?;

        let embedding = WordEmbedding::new(config.vocab_size, config.embedding_dim, vb.pp("embedding"))?;

        let convs = config
            .filter_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                ConvMaxPool::new(
                    config.embedding_dim,
                    config.num_filters,
                    size,
                    vb.pp(format!("conv_maxpool_{}", i)),
                )
            })
            .collect::<candle_core::Result<Vec<_>>>()?;

        let output = candle_nn::linear(config.num_filters_total(), config.num_classes, vb.pp("output"))?;

        Ok(Self {
            embedding,
            convs,
            output,
            l2_reg_lambda: config.l2_reg_lambda,
        })
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `input` - Token ids [batch, seq_len]
    /// * `dropout_p` - Drop probability before the output layer, 0 disables
    ///
    /// # Returns
    /// Raw scores [batch, num_classes]
    pub fn forward(&self, input: &Tensor, dropout_p: f32) -> candle_core::Result<Tensor> {
        // [batch, seq_len, dim] -> [batch, dim, seq_len] for conv1d
        let embedded = self.embedding.forward(input)?;
        let xs = embedded.transpose(1, 2)?.contiguous()?;

        let pooled = self
            .convs
            .iter()
            .map(|conv| conv.forward(&xs))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let features = Tensor::cat(&pooled, 1)?;

        let features = if dropout_p > 0.0 {
            candle_nn::ops::dropout(&features, dropout_p)?
        } else {
            features
        };

        self.output.forward(&features)
    }

    /// Mean cross-entropy plus `l2_reg_lambda * l2(output)`, `l2(x) = sum(x^2) / 2`
    pub fn loss(&self, scores: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
        let cross_entropy = loss::cross_entropy(scores, targets)?;
        if self.l2_reg_lambda == 0.0 {
            return Ok(cross_entropy);
        }

        let mut l2 = (self.output.weight().sqr()?.sum_all()? * 0.5)?;
        if let Some(bias) = self.output.bias() {
            l2 = (l2 + (bias.sqr()?.sum_all()? * 0.5)?)?;
        }

        cross_entropy + (l2 * self.l2_reg_lambda)?
    }
}

/// Fraction of rows whose highest score is the target
fn batch_accuracy(scores: &Tensor, targets: &Tensor) -> candle_core::Result<f64> {
    let predictions = scores.argmax(D::Minus1)?;
    let correct = predictions
        .eq(targets)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;
    Ok(correct as f64 / targets.dim(0)? as f64)
}

/// Text CNN with its parameters and optimiser
pub struct CnnClassifier {
    model: TextCnn,
    config: TextCnnConfig,
    varmap: VarMap,
    optimizer: AdamW,
    device: Device,
}

impl CnnClassifier {
    /// Create new classifier with freshly initialised parameters
    pub fn new(config: TextCnnConfig, device: Device) -> crate::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let model = TextCnn::new(&config, vb)?;

        // Plain Adam: the learning rate is set before every step
        let optimizer_params = ParamsAdamW {
            lr: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        };
        let optimizer = AdamW::new(varmap.all_vars(), optimizer_params)?;

        Ok(Self {
            model,
            config,
            varmap,
            optimizer,
            device,
        })
    }

    /// Create a classifier and restore a parameter snapshot into it
    pub fn from_checkpoint<P: AsRef<Path>>(
        config: TextCnnConfig,
        path: P,
        device: Device,
    ) -> crate::Result<Self> {
        let mut classifier = Self::new(config, device)?;
        classifier.load(path.as_ref())?;
        Ok(classifier)
    }

    pub fn config(&self) -> &TextCnnConfig {
        &self.config
    }

    /// Overwrite the embedding weights with pretrained vectors
    pub fn set_embeddings(&mut self, matrix: &EmbeddingMatrix) -> crate::Result<()> {
        if matrix.vocab_size != self.config.vocab_size || matrix.dim != self.config.embedding_dim {
            return Err(FosaError::Data(format!(
                "Embedding matrix is {}x{}, model expects {}x{}",
                matrix.vocab_size, matrix.dim, self.config.vocab_size, self.config.embedding_dim
            )));
        }

        let weight = Tensor::from_slice(&matrix.data, (matrix.vocab_size, matrix.dim), &self.device)?;
        self.varmap.set_one(EMBEDDING_WEIGHT, &weight)?;
        Ok(())
    }

    fn input_tensor(&self, inputs: &[Vec<u32>]) -> crate::Result<Tensor> {
        let seq_len = self.config.sequence_length;
        if let Some(ids) = inputs.iter().find(|ids| ids.len() != seq_len) {
            return Err(FosaError::Data(format!(
                "Input has {} ids, model expects {}",
                ids.len(),
                seq_len
            )));
        }

        let flat: Vec<u32> = inputs.iter().flatten().copied().collect();
        Ok(Tensor::from_vec(flat, (inputs.len(), seq_len), &self.device)?)
    }

    fn label_tensor(&self, inputs: &[Vec<u32>], labels: &[usize]) -> crate::Result<Tensor> {
        if labels.len() != inputs.len() {
            return Err(FosaError::Data(format!(
                "{} labels for {} inputs",
                labels.len(),
                inputs.len()
            )));
        }
        if let Some(&label) = labels.iter().find(|&&label| label >= self.config.num_classes) {
            return Err(FosaError::Data(format!(
                "Label {} out of range for {} classes",
                label, self.config.num_classes
            )));
        }

        let targets: Vec<u32> = labels.iter().map(|&label| label as u32).collect();
        Ok(Tensor::from_vec(targets, labels.len(), &self.device)?)
    }
}

impl Classifier for CnnClassifier {
    fn train_step(
        &mut self,
        inputs: &[Vec<u32>],
        labels: &[usize],
        learning_rate: f64,
        dropout_keep_prob: f64,
    ) -> crate::Result<StepMetrics> {
        if inputs.is_empty() {
            return Err(FosaError::Data("Empty training batch".to_string()));
        }

        let xs = self.input_tensor(inputs)?;
        let ys = self.label_tensor(inputs, labels)?;

        let dropout_p = (1.0 - dropout_keep_prob) as f32;
        let scores = self.model.forward(&xs, dropout_p)?;
        let loss = self.model.loss(&scores, &ys)?;

        let metrics = StepMetrics {
            loss: loss.to_scalar::<f32>()? as f64,
            accuracy: batch_accuracy(&scores, &ys)?,
        };

        self.optimizer.set_learning_rate(learning_rate);
        self.optimizer.backward_step(&loss)?;

        Ok(metrics)
    }

    fn evaluate(&self, inputs: &[Vec<u32>], labels: &[usize]) -> crate::Result<StepMetrics> {
        if inputs.is_empty() {
            return Ok(StepMetrics::default());
        }

        let xs = self.input_tensor(inputs)?;
        let ys = self.label_tensor(inputs, labels)?;

        let scores = self.model.forward(&xs, 0.0)?;
        let loss = self.model.loss(&scores, &ys)?;

        Ok(StepMetrics {
            loss: loss.to_scalar::<f32>()? as f64,
            accuracy: batch_accuracy(&scores, &ys)?,
        })
    }

    fn predict_batch(&self, inputs: &[Vec<u32>]) -> crate::Result<Vec<Prediction>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let xs = self.input_tensor(inputs)?;
        let scores = self.model.forward(&xs, 0.0)?;
        let classes = scores.argmax(D::Minus1)?.to_vec1::<u32>()?;
        let rows = scores.to_vec2::<f32>()?;

        Ok(classes
            .into_iter()
            .zip(rows)
            .map(|(class_index, scores)| Prediction {
                class_index: class_index as usize,
                scores,
            })
            .collect())
    }

    fn save(&self, path: &Path) -> crate::Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> crate::Result<()> {
        if !path.exists() {
            return Err(FosaError::Checkpoint(format!("No checkpoint at {:?}", path)));
        }
        self.varmap.load(path)?;
        Ok(())
    }
}
