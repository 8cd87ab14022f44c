/// Pretrained word vectors (GloVe text, word2vec text or binary)
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use rand::Rng;

use crate::config::EmbeddingKind;
use crate::data::Vocabulary;
use crate::FosaError;

/// Range of the uniform initialisation of words missing from the vectors file
const MISSING_WORD_RANGE: f32 = 0.25;

/// Row-major `[vocab_size, dim]` embedding matrix
#[derive(Debug, Clone)]
pub struct EmbeddingMatrix {
    pub data: Vec<f32>,
    pub vocab_size: usize,
    pub dim: usize,
    /// Vocabulary words found in the vectors file
    pub found: usize,
}

impl EmbeddingMatrix {
    /// Vector of one id
    pub fn row(&self, id: usize) -> &[f32] {
        &self.data[id * self.dim..(id + 1) * self.dim]
    }
}

/// Build an embedding matrix for `vocab` from a vectors file
///
/// Every row starts uniformly random; rows of words present in the file are
/// overwritten with their vector. `binary` selects the word2vec binary layout.
pub fn load_embedding_vectors<P: AsRef<Path>, R: Rng>(
    path: P,
    kind: EmbeddingKind,
    binary: bool,
    vocab: &Vocabulary,
    dim: usize,
    rng: &mut R,
) -> crate::Result<EmbeddingMatrix> {
    let path = path.as_ref();
    log::info!("Load {} file {:?}", kind, path);

    if binary && kind != EmbeddingKind::Word2vec {
        return Err(FosaError::Config(format!("{} vectors have no binary format", kind)));
    }

    let vocab_size = vocab.len();
    let mut data: Vec<f32> = (0..vocab_size * dim)
        .map(|_| rng.gen_range(-MISSING_WORD_RANGE..MISSING_WORD_RANGE))
        .collect();
    let mut found = 0;

    let mut store = |word: &str, vector: &[f32]| -> crate::Result<()> {
        if vector.len() != dim {
            return Err(FosaError::Data(format!(
                "Vector for '{}' has dimension {}, expected {}",
                word,
                vector.len(),
                dim
            )));
        }
        if let Some(id) = vocab.id(word) {
            let offset = id as usize * dim;
            data[offset..offset + dim].copy_from_slice(vector);
            found += 1;
        }
        Ok(())
    };

    let reader = BufReader::new(File::open(path)?);
    if binary {
        read_binary_vectors(reader, &mut store)?;
    } else {
        read_text_vectors(reader, kind, &mut store)?;
    }

    log::info!(
        "{} file has been loaded: {}/{} vocabulary words found",
        kind,
        found,
        vocab_size
    );

    Ok(EmbeddingMatrix {
        data,
        vocab_size,
        dim,
        found,
    })
}

/// One `word v1 v2 ...` entry per line
fn read_text_vectors<B, F>(reader: B, kind: EmbeddingKind, store: &mut F) -> crate::Result<()>
where
    B: BufRead,
    F: FnMut(&str, &[f32]) -> crate::Result<()>,
{
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            continue;
        };

        // word2vec text files open with "<count> <dim>"
        if line_no == 0 && kind == EmbeddingKind::Word2vec && word.parse::<usize>().is_ok() {
            continue;
        }

        let vector = parts
            .map(|value| value.parse::<f32>())
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| {
                FosaError::Data(format!("Bad vector for '{}' at line {}: {}", word, line_no + 1, e))
            })?;
        store(word, &vector)?;
    }
    Ok(())
}

/// word2vec binary: a `<count> <dim>` text header, then per word its bytes,
/// a space and `dim` little-endian f32
fn read_binary_vectors<B, F>(mut reader: B, store: &mut F) -> crate::Result<()>
where
    B: BufRead,
    F: FnMut(&str, &[f32]) -> crate::Result<()>,
{
    let mut header = String::new();
    reader.read_line(&mut header)?;
    let mut fields = header.split_whitespace().map(str::parse::<usize>);
    let (count, dim) = match (fields.next(), fields.next()) {
        (Some(Ok(count)), Some(Ok(dim))) => (count, dim),
        _ => {
            return Err(FosaError::Data(format!(
                "Bad word2vec binary header '{}'",
                header.trim_end()
            )))
        }
    };

    let mut word = Vec::new();
    let mut bytes = vec![0u8; dim * 4];
    let mut vector = vec![0f32; dim];

    for entry in 0..count {
        word.clear();
        if reader.read_until(b' ', &mut word)? == 0 {
            return Err(FosaError::Data(format!(
                "word2vec binary file ends after {} of {} words",
                entry, count
            )));
        }
        reader.read_exact(&mut bytes)?;

        // Vectors may be followed by a newline before the next word
        let text = String::from_utf8_lossy(&word);
        let text = text.trim_matches(|c: char| c == ' ' || c == '\n');

        for (value, chunk) in vector.iter_mut().zip(bytes.chunks_exact(4)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        store(text, &vector)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_vectors(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_glove_vectors_replace_rows() {
        let vocab = Vocabulary::fit(&["good food"], 0);
        let file = write_vectors("good 0.1 0.2 0.3\nunrelated 1.0 1.0 1.0\n");

        let matrix = load_embedding_vectors(
            file.path(),
            EmbeddingKind::Glove,
            false,
            &vocab,
            3,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        assert_eq!(matrix.vocab_size, 3);
        assert_eq!(matrix.found, 1);
        assert_eq!(matrix.row(1), &[0.1, 0.2, 0.3]);
        assert!(matrix.row(2).iter().all(|v| v.abs() <= MISSING_WORD_RANGE));
    }

    #[test]
    fn test_word2vec_header_is_skipped() {
        let vocab = Vocabulary::fit(&["food"], 0);
        let file = write_vectors("2 2\nfood 0.5 -0.5\nservice 0.1 0.1\n");

        let matrix = load_embedding_vectors(
            file.path(),
            EmbeddingKind::Word2vec,
            false,
            &vocab,
            2,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        assert_eq!(matrix.found, 1);
        assert_eq!(matrix.row(1), &[0.5, -0.5]);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let vocab = Vocabulary::fit(&["food"], 0);
        let file = write_vectors("food 0.5 -0.5\n");

        let result = load_embedding_vectors(
            file.path(),
            EmbeddingKind::Glove,
            false,
            &vocab,
            3,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FosaError::Data(_))));
    }

    /// word2vec binary file of 2-dimensional vectors
    fn binary_vectors(entries: &[(&str, [f32; 2])]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{} 2\n", entries.len()).unwrap();
        for (word, vector) in entries {
            write!(file, "{} ", word).unwrap();
            for value in vector.iter() {
                file.write_all(&value.to_le_bytes()).unwrap();
            }
            file.write_all(b"\n").unwrap();
        }
        file
    }

    #[test]
    fn test_word2vec_binary_vectors() {
        let vocab = Vocabulary::fit(&["good food"], 0);
        let file = binary_vectors(&[("food", [0.5, -0.25]), ("wine", [1.0, 1.0]), ("good", [2.0, 3.5])]);

        let matrix = load_embedding_vectors(
            file.path(),
            EmbeddingKind::Word2vec,
            true,
            &vocab,
            2,
            &mut StdRng::seed_from_u64(0),
        )
        .unwrap();

        assert_eq!(matrix.found, 2);
        assert_eq!(matrix.row(vocab.id("food").unwrap() as usize), &[0.5, -0.25]);
        assert_eq!(matrix.row(vocab.id("good").unwrap() as usize), &[2.0, 3.5]);
    }

    #[test]
    fn test_word2vec_binary_truncated_and_wrong_dimension() {
        let vocab = Vocabulary::fit(&["food"], 0);

        let mut truncated = tempfile::NamedTempFile::new().unwrap();
        truncated.write_all(b"2 2\nfood ").unwrap();
        truncated.write_all(&0.5f32.to_le_bytes()).unwrap();
        truncated.write_all(&1.5f32.to_le_bytes()).unwrap();
        let result = load_embedding_vectors(
            truncated.path(),
            EmbeddingKind::Word2vec,
            true,
            &vocab,
            2,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FosaError::Data(_))));

        let file = binary_vectors(&[("food", [0.5, -0.25])]);
        let result = load_embedding_vectors(
            file.path(),
            EmbeddingKind::Word2vec,
            true,
            &vocab,
            3,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FosaError::Data(_))));

        let result = load_embedding_vectors(
            file.path(),
            EmbeddingKind::Glove,
            true,
            &vocab,
            2,
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(FosaError::Config(_))));
    }
}
