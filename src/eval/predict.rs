/// Batch prediction over an encoded test set
use std::path::Path;

use crate::data::BatchIter;
use crate::models::Classifier;
use crate::FosaError;

/// Softmax of one row of raw scores
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Prediction for one test sentence
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// Sentence before cleaning
    pub text: String,
    pub class_index: usize,
    /// Softmax of the scores
    pub probabilities: Vec<f32>,
}

/// Predict every sentence in order, in non-shuffled batches
///
/// # Arguments
/// * `classifier` - Restored classifier
/// * `texts` - Raw sentences, parallel to `inputs`
/// * `inputs` - Encoded sentences
/// * `batch_size` - Sentences per forward pass
pub fn predict_all<C: Classifier + ?Sized>(
    classifier: &C,
    texts: &[String],
    inputs: &[Vec<u32>],
    batch_size: usize,
) -> crate::Result<Vec<PredictionRecord>> {
    if texts.len() != inputs.len() {
        return Err(FosaError::Data(format!(
            "{} texts for {} encoded inputs",
            texts.len(),
            inputs.len()
        )));
    }

    let mut records = Vec::with_capacity(inputs.len());
    let mut offset = 0;
    for batch in BatchIter::sequential(inputs, batch_size.max(1), 1) {
        let batch: Vec<Vec<u32>> = batch.into_iter().cloned().collect();
        let predictions = classifier.predict_batch(&batch)?;
        if predictions.len() != batch.len() {
            return Err(FosaError::Data(format!(
                "Classifier returned {} predictions for a batch of {}",
                predictions.len(),
                batch.len()
            )));
        }
        for prediction in predictions {
            records.push(PredictionRecord {
                text: texts[offset].clone(),
                class_index: prediction.class_index,
                probabilities: softmax(&prediction.scores),
            });
            offset += 1;
        }
    }

    Ok(records)
}

fn format_probabilities(probabilities: &[f32]) -> String {
    let values: Vec<String> = probabilities.iter().map(|p| format!("{:.8}", p)).collect();
    format!("[{}]", values.join(" "))
}

/// Write `text, class_index, [probabilities]` rows without a header
pub fn write_predictions_csv<P: AsRef<Path>>(path: P, records: &[PredictionRecord]) -> crate::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path.as_ref())?;

    for record in records {
        writer.write_record([
            record.text.clone(),
            record.class_index.to_string(),
            format_probabilities(&record.probabilities),
        ])?;
    }
    writer.flush()?;

    log::info!("Saving evaluation to {:?}", path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LabeledDataset;
    use crate::models::{Prediction, StepMetrics};

    /// Predicts the first id of each input as the class
    struct FirstIdClassifier {
        num_classes: usize,
    }

    impl Classifier for FirstIdClassifier {
        fn train_step(&mut self, _: &[Vec<u32>], _: &[usize], _: f64, _: f64) -> crate::Result<StepMetrics> {
            Ok(StepMetrics::default())
        }

        fn evaluate(&self, _: &[Vec<u32>], _: &[usize]) -> crate::Result<StepMetrics> {
            Ok(StepMetrics::default())
        }

        fn predict_batch(&self, inputs: &[Vec<u32>]) -> crate::Result<Vec<Prediction>> {
            Ok(inputs
                .iter()
                .map(|ids| {
                    let class_index = ids[0] as usize % self.num_classes;
                    let mut scores = vec![0.0; self.num_classes];
                    scores[class_index] = 2.0;
                    Prediction { class_index, scores }
                })
                .collect())
        }

        fn save(&self, _: &Path) -> crate::Result<()> {
            Ok(())
        }

        fn load(&mut self, _: &Path) -> crate::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_softmax() {
        let probabilities = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probabilities[2] > probabilities[1]);

        // Large scores do not overflow
        let stable = softmax(&[1000.0, 1000.0]);
        assert!((stable[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_predict_all_keeps_order_across_batches() -> crate::Result<()> {
        let classifier = FirstIdClassifier { num_classes: 3 };
        let texts: Vec<String> = (0..5).map(|i| format!("sentence {}", i)).collect();
        let inputs: Vec<Vec<u32>> = (0..5).map(|i| vec![i, 0]).collect();

        let records = predict_all(&classifier, &texts, &inputs, 2)?;

        assert_eq!(records.len(), 5);
        let classes: Vec<usize> = records.iter().map(|r| r.class_index).collect();
        assert_eq!(classes, vec![0, 1, 2, 0, 1]);
        assert_eq!(records[4].text, "sentence 4");
        Ok(())
    }

    #[test]
    fn test_predictions_csv() -> crate::Result<()> {
        let classifier = FirstIdClassifier { num_classes: 2 };
        let dataset = LabeledDataset {
            texts: vec!["good, food".to_string(), "bad".to_string()],
            labels: vec![0, 0],
            target_names: vec!["FOOD".to_string(), "SERVICE".to_string()],
        };
        let inputs = vec![vec![2, 0], vec![1, 0]];

        let records = predict_all(&classifier, &dataset.texts, &inputs, 64)?;
        assert_eq!(records[0].class_index, 0);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("prediction.csv");
        write_predictions_csv(&path, &records)?;

        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(&path)?;
        let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "good, food");
        assert_eq!(&rows[1][1], "1");
        assert!(rows[0][2].starts_with('['));
        Ok(())
    }

    #[test]
    fn test_length_mismatch() {
        let classifier = FirstIdClassifier { num_classes: 2 };
        let result = predict_all(&classifier, &["a".to_string()], &[], 4);
        assert!(matches!(result, Err(FosaError::Data(_))));
    }
}
