/// Data loading modules for classifier training
pub mod batch;
pub mod corpus;
pub mod embeddings;
pub mod vocab;

pub use batch::{batches_per_epoch, train_dev_split, BatchIter};
pub use corpus::{clean_str, LabeledDataset, ReviewSentence, SentenceRecord};
pub use embeddings::{load_embedding_vectors, EmbeddingMatrix};
pub use vocab::Vocabulary;

/// One encoded example: padded token ids and a class index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub ids: Vec<u32>,
    pub label: usize,
}

/// Encode every (text, label) pair of a dataset with a fitted vocabulary
pub fn encode(dataset: &LabeledDataset, vocab: &Vocabulary) -> Vec<Example> {
    dataset
        .cleaned_texts()
        .iter()
        .zip(dataset.labels.iter())
        .map(|(text, &label)| Example {
            ids: vocab.transform(text),
            label,
        })
        .collect()
}

/// Split a batch of examples into model inputs and labels
pub fn unzip_batch(batch: &[&Example]) -> (Vec<Vec<u32>>, Vec<usize>) {
    batch
        .iter()
        .map(|example| (example.ids.clone(), example.label))
        .unzip()
}
