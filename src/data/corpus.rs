/// SemEval review corpus: loading, simplification and focus datasets
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Focus;
use crate::FosaError;

pub const RESTAURANT_ENTITIES: &[&str] = &[
    "FOOD",
    "DRINKS",
    "SERVICE",
    "RESTAURANT",
    "AMBIENCE",
    "LOCATION",
];

pub const LAPTOP_ENTITIES: &[&str] = &[
    "LAPTOP", "HARDWARE", "SHIPPING", "COMPANY", "SUPPORT", "SOFTWARE",
];

pub const RESTAURANT_ASPECTS: &[&str] = &[
    "RESTAURANT#GENERAL",
    "RESTAURANT#PRICES",
    "RESTAURANT#MISCELLANEOUS",
    "FOOD#PRICES",
    "FOOD#QUALITY",
    "FOOD#STYLE_OPTIONS",
    "DRINKS#PRICES",
    "DRINKS#QUALITY",
    "DRINKS#STYLE_OPTIONS",
    "AMBIENCE#GENERAL",
    "SERVICE#GENERAL",
    "LOCATION#GENERAL",
];

pub const POLARITIES: &[&str] = &["positive", "neutral", "negative"];

/// Opinion annotated on a sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opinion {
    /// `ENTITY#ATTRIBUTE`
    pub category: String,
    pub polarity: String,
}

impl Opinion {
    /// Entity part of the category
    pub fn entity(&self) -> &str {
        self.category.split('#').next().unwrap_or(&self.category)
    }
}

/// Sentence as found in the corpus file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSentence {
    pub review_id: String,
    pub sentence_id: String,
    pub text: String,
    #[serde(default)]
    pub opinions: Vec<Opinion>,
}

/// Ground truth of one sentence, reduced to a single feature and polarity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub review_id: String,
    pub sentence_id: String,
    pub text: String,
    pub feature: String,
    pub polarity: String,
}

impl SentenceRecord {
    /// Label of this record for a focus
    pub fn label(&self, focus: Focus) -> &str {
        match focus {
            Focus::Feature => &self.feature,
            Focus::Polarity => &self.polarity,
        }
    }
}

/// Load the review sentences of a corpus file
pub fn load_sentences<P: AsRef<Path>>(path: P) -> crate::Result<Vec<ReviewSentence>> {
    let path = path.as_ref();
    log::info!("Loading corpus from: {:?}", path);

    let file = File::open(path)?;
    let sentences: Vec<ReviewSentence> = serde_json::from_reader(BufReader::new(file))?;

    log::debug!("Loaded {} sentences", sentences.len());
    Ok(sentences)
}

/// Reduce sentences to one (feature, polarity) pair each
///
/// Only the first opinion of a sentence is kept; sentences without opinions
/// are dropped.
pub fn simplify(sentences: &[ReviewSentence], aspects: bool) -> Vec<SentenceRecord> {
    sentences
        .iter()
        .filter_map(|sentence| {
            let opinion = sentence.opinions.first()?;
            let feature = if aspects {
                opinion.category.clone()
            } else {
                opinion.entity().to_string()
            };
            Some(SentenceRecord {
                review_id: sentence.review_id.clone(),
                sentence_id: sentence.sentence_id.clone(),
                text: sentence.text.clone(),
                feature,
                polarity: opinion.polarity.clone(),
            })
        })
        .collect()
}

/// Load and simplify a corpus file
pub fn load_records<P: AsRef<Path>>(path: P, aspects: bool) -> crate::Result<Vec<SentenceRecord>> {
    let sentences = load_sentences(path)?;
    let records = simplify(&sentences, aspects);
    log::info!(
        "Kept {} of {} sentences with an opinion",
        records.len(),
        sentences.len()
    );
    Ok(records)
}

/// Labelled dataset for one focus
///
/// `texts` are the raw sentences; they are cleaned on demand so the raw form
/// stays available for joining predictions back to the corpus.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub texts: Vec<String>,
    pub labels: Vec<usize>,
    pub target_names: Vec<String>,
}

impl LabeledDataset {
    /// Build the dataset of a focus from simplified records
    pub fn from_records(
        records: &[SentenceRecord],
        focus: Focus,
        target_names: &[&str],
    ) -> crate::Result<Self> {
        let mut texts = Vec::with_capacity(records.len());
        let mut labels = Vec::with_capacity(records.len());

        for record in records {
            let label = record.label(focus);
            let class = target_names
                .iter()
                .position(|name| *name == label)
                .ok_or_else(|| {
                    FosaError::Data(format!(
                        "Unknown {} label '{}' in sentence {}. Expected one of {:?}",
                        focus, label, record.sentence_id, target_names
                    ))
                })?;
            texts.push(record.text.clone());
            labels.push(class);
        }

        Ok(Self {
            texts,
            labels,
            target_names: target_names.iter().map(|name| name.to_string()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.target_names.len()
    }

    /// Texts after [`clean_str`]
    pub fn cleaned_texts(&self) -> Vec<String> {
        self.texts.iter().map(|text| clean_str(text)).collect()
    }

    /// Number of examples per class
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Normalise a sentence before tokenisation
///
/// Lower-cases, blanks out anything outside `[a-z0-9(),!?'`]`, detaches
/// contractions and punctuation, and collapses whitespace.
pub fn clean_str(text: &str) -> String {
    let mut cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "(),!?'`".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect();

    for contraction in ["'s", "'ve", "n't", "'re", "'d", "'ll"] {
        cleaned = cleaned.replace(contraction, &format!(" {}", contraction));
    }
    for punct in [",", "!", "(", ")", "?"] {
        cleaned = cleaned.replace(punct, &format!(" {} ", punct));
    }

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
