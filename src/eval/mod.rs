/// Test-set evaluation: per-focus prediction, metrics and joint scoring
pub mod aggregate;
pub mod metrics;
pub mod predict;

pub use aggregate::{aggregate, write_joint_csv, Aggregation, CombinedClasses, FocusPredictions, JointPrediction};
pub use metrics::{AverageMetrics, ClassMetrics, ClassificationReport};
pub use predict::{predict_all, softmax, write_predictions_csv, PredictionRecord};
