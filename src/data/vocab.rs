/// Token-to-id vocabulary with a fixed document length
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Reserved id for padding and out-of-vocabulary tokens
pub const UNKNOWN_ID: u32 = 0;
const UNKNOWN_TOKEN: &str = "<UNK>";

/// Split text into tokens: runs of alphanumerics, `'`, `-` and `_`
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-' || c == '_'))
        .filter(|token| !token.is_empty())
}

/// Vocabulary fitted on the training texts
///
/// Ids are handed out in order of first appearance, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    max_document_length: usize,
    words: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Fit on texts
    ///
    /// The document length is the longest token count, but never less than
    /// `min_length`.
    pub fn fit<S: AsRef<str>>(texts: &[S], min_length: usize) -> Self {
        let mut words = vec![UNKNOWN_TOKEN.to_string()];
        let mut index = HashMap::new();
        let mut longest = 0;

        for text in texts {
            let mut count = 0;
            for token in tokenize(text.as_ref()) {
                count += 1;
                if !index.contains_key(token) {
                    index.insert(token.to_string(), words.len() as u32);
                    words.push(token.to_string());
                }
            }
            longest = longest.max(count);
        }

        Self {
            max_document_length: longest.max(min_length),
            words,
            index,
        }
    }

    /// Map a text to exactly `max_document_length` ids
    pub fn transform(&self, text: &str) -> Vec<u32> {
        let mut ids: Vec<u32> = tokenize(text)
            .take(self.max_document_length)
            .map(|token| self.id(token).unwrap_or(UNKNOWN_ID))
            .collect();
        ids.resize(self.max_document_length, UNKNOWN_ID);
        ids
    }

    /// Map several texts
    pub fn transform_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<u32>> {
        texts.iter().map(|text| self.transform(text.as_ref())).collect()
    }

    /// Number of ids, including the unknown token
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.len() <= 1
    }

    pub fn max_document_length(&self) -> usize {
        self.max_document_length
    }

    pub fn id(&self, word: &str) -> Option<u32> {
        self.index.get(word).copied()
    }

    /// Words in id order
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// Save as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Restore a vocabulary written by [`Vocabulary::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let mut vocab: Vocabulary = serde_json::from_reader(reader)?;
        vocab.index = vocab
            .words
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, word)| (word.clone(), id as u32))
            .collect();
        Ok(vocab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens: Vec<&str> = tokenize("the staff is n't well-trained , sadly").collect();
        assert_eq!(tokens, vec!["the", "staff", "is", "n't", "well-trained", "sadly"]);
    }

    #[test]
    fn test_fit_assigns_ids_in_order() {
        let vocab = Vocabulary::fit(&["a good meal", "a bad service"], 0);

        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.words().next(), Some("<UNK>"));
        assert_eq!(vocab.id("a"), Some(1));
        assert_eq!(vocab.id("meal"), Some(3));
        assert_eq!(vocab.id("service"), Some(5));
        assert_eq!(vocab.max_document_length(), 3);
    }

    #[test]
    fn test_transform_pads_and_truncates() {
        let vocab = Vocabulary::fit(&["a good meal"], 5);

        assert_eq!(vocab.transform("good meal"), vec![2, 3, 0, 0, 0]);
        assert_eq!(vocab.transform("a a a a a a a"), vec![1; 5]);
        assert_eq!(vocab.transform("tasty meal"), vec![0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");

        let vocab = Vocabulary::fit(&["the food was great", "the service was slow"], 4);
        vocab.save(&path).unwrap();

        let restored = Vocabulary::load(&path).unwrap();
        assert_eq!(restored.len(), vocab.len());
        assert_eq!(restored.max_document_length(), 4);
        assert_eq!(
            restored.transform("the service was great"),
            vocab.transform("the service was great")
        );
        assert_eq!(restored.id("<UNK>"), None);
    }
}
