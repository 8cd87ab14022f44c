/// Classification metrics over predicted and true class indices
use std::fmt::Write as _;

use crate::FosaError;

/// Precision, recall, F1 and support of one class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Per-class report, averages, accuracy and confusion matrix
///
/// Classes that neither occur in the ground truth nor are ever predicted are
/// left out of the per-class rows and the averages.
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub accuracy: f64,
    pub total: usize,
    /// `confusion[true][predicted]` over all target names
    pub confusion: Vec<Vec<usize>>,
    target_names: Vec<String>,
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Support-weighted mean of one metric
fn weighted_mean(classes: &[ClassMetrics], total: usize, value: impl Fn(&ClassMetrics) -> f64) -> f64 {
    safe_div(
        classes.iter().map(|c| value(c) * c.support as f64).sum(),
        total as f64,
    )
}

impl ClassificationReport {
    /// Compute the report
    ///
    /// # Arguments
    /// * `y_true` - True class indices
    /// * `y_pred` - Predicted class indices, same length as `y_true`
    /// * `target_names` - Name of every class index
    pub fn compute(y_true: &[usize], y_pred: &[usize], target_names: &[String]) -> crate::Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(FosaError::Data(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let n = target_names.len();
        if let Some(&bad) = y_true.iter().chain(y_pred.iter()).find(|&&label| label >= n) {
            return Err(FosaError::Data(format!(
                "Class index {} out of range for {} target names",
                bad, n
            )));
        }

        let mut confusion = vec![vec![0usize; n]; n];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            confusion[t][p] += 1;
        }

        let mut classes = Vec::new();
        for (class, name) in target_names.iter().enumerate() {
            let support: usize = confusion[class].iter().sum();
            let predicted: usize = confusion.iter().map(|row| row[class]).sum();
            if support == 0 && predicted == 0 {
                continue;
            }

            let tp = confusion[class][class] as f64;
            let precision = safe_div(tp, predicted as f64);
            let recall = safe_div(tp, support as f64);
            let f1 = safe_div(2.0 * precision * recall, precision + recall);

            classes.push(ClassMetrics {
                name: name.clone(),
                precision,
                recall,
                f1,
                support,
            });
        }

        let total = y_true.len();
        let correct = (0..n).map(|i| confusion[i][i]).sum::<usize>();

        let count = classes.len() as f64;
        let macro_avg = AverageMetrics {
            precision: safe_div(classes.iter().map(|c| c.precision).sum(), count),
            recall: safe_div(classes.iter().map(|c| c.recall).sum(), count),
            f1: safe_div(classes.iter().map(|c| c.f1).sum(), count),
        };

        let weighted_avg = AverageMetrics {
            precision: weighted_mean(&classes, total, |c| c.precision),
            recall: weighted_mean(&classes, total, |c| c.recall),
            f1: weighted_mean(&classes, total, |c| c.f1),
        };

        Ok(Self {
            classes,
            macro_avg,
            weighted_avg,
            accuracy: safe_div(correct as f64, total as f64),
            total,
            confusion,
            target_names: target_names.to_vec(),
        })
    }

    /// Plain-text table of the per-class metrics and averages
    pub fn to_report(&self) -> String {
        let width = self
            .classes
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(12);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>width$} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        );
        let _ = writeln!(out);

        for class in &self.classes {
            let _ = writeln!(
                out,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                class.name, class.precision, class.recall, class.f1, class.support
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(
            out,
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.total
        );
        for (label, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                label, avg.precision, avg.recall, avg.f1, self.total
            );
        }

        out
    }

    /// Confusion matrix, one line per true class
    pub fn confusion_to_string(&self) -> String {
        let mut out = String::new();
        for (name, row) in self.target_names.iter().zip(self.confusion.iter()) {
            let cells: Vec<String> = row.iter().map(|count| format!("{:>5}", count)).collect();
            let _ = writeln!(out, "{:>20} [{}]", name, cells.join(" "));
        }
        out
    }
}
