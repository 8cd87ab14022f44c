/// Joint (feature, polarity) scoring of the two focus models
///
/// Each ground-truth sentence is looked up by its text in the prediction list
/// of each model; the first identical text wins. Two sentences with the same
/// text therefore share the predictions of the first one.
use std::path::Path;

use serde::Serialize;

use super::metrics::ClassificationReport;
use super::predict::PredictionRecord;
use crate::data::SentenceRecord;
use crate::FosaError;

/// Predictions of one focus model, in test-set order
#[derive(Debug, Clone)]
pub struct FocusPredictions {
    pub texts: Vec<String>,
    pub predicted: Vec<usize>,
    pub target_names: Vec<String>,
}

impl FocusPredictions {
    pub fn from_records(records: &[PredictionRecord], target_names: &[String]) -> Self {
        Self {
            texts: records.iter().map(|r| r.text.clone()).collect(),
            predicted: records.iter().map(|r| r.class_index).collect(),
            target_names: target_names.to_vec(),
        }
    }

    /// Predicted label of the first sentence whose text is `text`
    pub fn label_for(&self, text: &str) -> crate::Result<&str> {
        let position = self
            .texts
            .iter()
            .position(|candidate| candidate == text)
            .ok_or_else(|| FosaError::Lookup(format!("No prediction for sentence '{}'", text)))?;

        let class = self.predicted[position];
        self.target_names
            .get(class)
            .map(String::as_str)
            .ok_or_else(|| {
                FosaError::Lookup(format!(
                    "Predicted class {} has no name ({} target names)",
                    class,
                    self.target_names.len()
                ))
            })
    }
}

/// Numbering of (entity, polarity) pairs
///
/// Entities are the outer loop and polarities the inner one, so with three
/// polarities `(entities[1], polarities[0])` is class 3.
#[derive(Debug, Clone)]
pub struct CombinedClasses {
    entities: Vec<String>,
    polarities: Vec<String>,
}

impl CombinedClasses {
    pub fn new(entities: &[&str], polarities: &[&str]) -> Self {
        Self {
            entities: entities.iter().map(|e| e.to_string()).collect(),
            polarities: polarities.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len() * self.polarities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Combined id of a pair
    pub fn id(&self, entity: &str, polarity: &str) -> crate::Result<usize> {
        let entity_idx = self
            .entities
            .iter()
            .position(|e| e == entity)
            .ok_or_else(|| FosaError::Lookup(format!("Unknown entity '{}'", entity)))?;
        let polarity_idx = self
            .polarities
            .iter()
            .position(|p| p == polarity)
            .ok_or_else(|| FosaError::Lookup(format!("Unknown polarity '{}'", polarity)))?;
        Ok(entity_idx * self.polarities.len() + polarity_idx)
    }

    /// `(id, entity, polarity)` in id order
    pub fn legend(&self) -> Vec<(usize, &str, &str)> {
        let mut legend = Vec::with_capacity(self.len());
        for entity in &self.entities {
            for polarity in &self.polarities {
                legend.push((legend.len(), entity.as_str(), polarity.as_str()));
            }
        }
        legend
    }

    /// Class names used in the combined report: the ids themselves
    pub fn names(&self) -> Vec<String> {
        (0..self.len()).map(|id| id.to_string()).collect()
    }
}

/// One row of `predictions.csv`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointPrediction {
    pub review_id: String,
    pub sentence_id: String,
    pub text: String,
    pub feature: String,
    pub pred_feature: String,
    pub polarity: String,
    pub pred_polarity: String,
    /// Feature and polarity both correct
    pub check: bool,
    pub new_class: usize,
    pub pred_new_class: usize,
}

/// Result of the joint scoring
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub predictions: Vec<JointPrediction>,
    pub report: ClassificationReport,
    /// Fraction of sentences with `check == true`
    pub fully_correct: f64,
}

/// Join both models' predictions to the ground truth and score them jointly
pub fn aggregate(
    truth: &[SentenceRecord],
    feature: &FocusPredictions,
    polarity: &FocusPredictions,
    classes: &CombinedClasses,
) -> crate::Result<Aggregation> {
    let mut predictions = Vec::with_capacity(truth.len());

    for record in truth {
        let pred_feature = feature.label_for(&record.text)?;
        let pred_polarity = polarity.label_for(&record.text)?;

        predictions.push(JointPrediction {
            review_id: record.review_id.clone(),
            sentence_id: record.sentence_id.clone(),
            text: record.text.clone(),
            feature: record.feature.clone(),
            pred_feature: pred_feature.to_string(),
            polarity: record.polarity.clone(),
            pred_polarity: pred_polarity.to_string(),
            check: record.feature == pred_feature && record.polarity == pred_polarity,
            new_class: classes.id(&record.feature, &record.polarity)?,
            pred_new_class: classes.id(pred_feature, pred_polarity)?,
        });
    }

    let y_true: Vec<usize> = predictions.iter().map(|p| p.new_class).collect();
    let y_pred: Vec<usize> = predictions.iter().map(|p| p.pred_new_class).collect();
    let report = ClassificationReport::compute(&y_true, &y_pred, &classes.names())?;

    let fully_correct = if predictions.is_empty() {
        0.0
    } else {
        predictions.iter().filter(|p| p.check).count() as f64 / predictions.len() as f64
    };

    Ok(Aggregation {
        predictions,
        report,
        fully_correct,
    })
}

/// Write the joint predictions with a header row
pub fn write_joint_csv<P: AsRef<Path>>(path: P, predictions: &[JointPrediction]) -> crate::Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for prediction in predictions {
        writer.serialize(prediction)?;
    }
    writer.flush()?;
    log::info!("Saving joint predictions to {:?}", path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::corpus::{POLARITIES, RESTAURANT_ENTITIES};

    fn record(id: &str, text: &str, feature: &str, polarity: &str) -> SentenceRecord {
        SentenceRecord {
            review_id: "r1".to_string(),
            sentence_id: id.to_string(),
            text: text.to_string(),
            feature: feature.to_string(),
            polarity: polarity.to_string(),
        }
    }

    fn names(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    /// Predictions equal to the ground truth of `truth`
    fn oracle(truth: &[SentenceRecord], labels: &[&str], feature: bool) -> FocusPredictions {
        FocusPredictions {
            texts: truth.iter().map(|r| r.text.clone()).collect(),
            predicted: truth
                .iter()
                .map(|r| {
                    let label = if feature { &r.feature } else { &r.polarity };
                    labels.iter().position(|l| *l == label.as_str()).unwrap_or(0)
                })
                .collect(),
            target_names: names(labels),
        }
    }

    fn truth() -> Vec<SentenceRecord> {
        vec![
            record("1", "a good meal", "FOOD", "positive"),
            record("2", "bad service", "SERVICE", "negative"),
            record("3", "the place is ok", "AMBIENCE", "neutral"),
        ]
    }

    #[test]
    fn test_combined_ids() -> crate::Result<()> {
        let classes = CombinedClasses::new(RESTAURANT_ENTITIES, POLARITIES);
        assert_eq!(classes.len(), 18);
        assert_eq!(classes.id(RESTAURANT_ENTITIES[0], "positive")?, 0);
        assert_eq!(classes.id(RESTAURANT_ENTITIES[1], "positive")?, 3);
        assert_eq!(classes.id(RESTAURANT_ENTITIES[1], "negative")?, 5);
        assert!(matches!(classes.id("PIZZA", "positive"), Err(FosaError::Lookup(_))));

        let legend = classes.legend();
        assert_eq!(legend[4], (4, RESTAURANT_ENTITIES[1], "neutral"));
        Ok(())
    }

    #[test]
    fn test_ground_truth_joined_with_itself_is_fully_correct() -> crate::Result<()> {
        let truth = truth();
        let classes = CombinedClasses::new(RESTAURANT_ENTITIES, POLARITIES);
        let feature = oracle(&truth, RESTAURANT_ENTITIES, true);
        let polarity = oracle(&truth, POLARITIES, false);

        let aggregation = aggregate(&truth, &feature, &polarity, &classes)?;

        assert_eq!(aggregation.fully_correct, 1.0);
        assert!(aggregation.predictions.iter().all(|p| p.check));
        assert_eq!(aggregation.report.accuracy, 1.0);
        Ok(())
    }

    #[test]
    fn test_check_requires_both_correct() -> crate::Result<()> {
        let truth = truth();
        let classes = CombinedClasses::new(RESTAURANT_ENTITIES, POLARITIES);
        let feature = oracle(&truth, RESTAURANT_ENTITIES, true);
        let mut polarity = oracle(&truth, POLARITIES, false);
        // "bad service" predicted positive
        polarity.predicted[1] = 0;

        let aggregation = aggregate(&truth, &feature, &polarity, &classes)?;

        let checks: Vec<bool> = aggregation.predictions.iter().map(|p| p.check).collect();
        assert_eq!(checks, vec![true, false, true]);
        assert!((aggregation.fully_correct - 2.0 / 3.0).abs() < 1e-12);

        let wrong = &aggregation.predictions[1];
        assert_eq!(wrong.pred_polarity, "positive");
        assert_eq!(wrong.pred_new_class, classes.id("SERVICE", "positive")?);
        Ok(())
    }

    #[test]
    fn test_duplicate_text_uses_first_prediction() -> crate::Result<()> {
        let feature = FocusPredictions {
            texts: names(&["same", "same"]),
            predicted: vec![1, 0],
            target_names: names(&["FOOD", "SERVICE"]),
        };
        assert_eq!(feature.label_for("same")?, "SERVICE");
        Ok(())
    }

    #[test]
    fn test_missing_text_is_lookup_error() {
        let truth = truth();
        let classes = CombinedClasses::new(RESTAURANT_ENTITIES, POLARITIES);
        let mut feature = oracle(&truth, RESTAURANT_ENTITIES, true);
        feature.texts[2] = "something else".to_string();
        let polarity = oracle(&truth, POLARITIES, false);

        let result = aggregate(&truth, &feature, &polarity, &classes);
        assert!(matches!(result, Err(FosaError::Lookup(_))));
    }

    #[test]
    fn test_write_joint_csv() -> crate::Result<()> {
        let truth = truth();
        let classes = CombinedClasses::new(RESTAURANT_ENTITIES, POLARITIES);
        let aggregation = aggregate(
            &truth,
            &oracle(&truth, RESTAURANT_ENTITIES, true),
            &oracle(&truth, POLARITIES, false),
            &classes,
        )?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("predictions.csv");
        write_joint_csv(&path, &aggregation.predictions)?;

        let mut reader = csv::Reader::from_path(&path)?;
        let headers = reader.headers()?.clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![
                "review_id", "sentence_id", "text", "feature", "pred_feature",
                "polarity", "pred_polarity", "check", "new_class", "pred_new_class"
            ]
        );
        assert_eq!(reader.records().count(), 3);
        Ok(())
    }
}
