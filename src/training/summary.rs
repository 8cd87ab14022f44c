/// Train/dev metric summaries
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// One summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub step: usize,
    pub loss: f64,
    pub accuracy: f64,
    /// Only recorded for train steps
    pub learning_rate: Option<f64>,
    /// Unix seconds
    pub timestamp: i64,
}

impl SummaryRecord {
    pub fn new(step: usize, loss: f64, accuracy: f64, learning_rate: Option<f64>) -> Self {
        Self {
            step,
            loss,
            accuracy,
            learning_rate,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Sink for summary rows
pub trait SummaryWriter {
    fn record(&mut self, record: &SummaryRecord) -> crate::Result<()>;
}

/// Writes summaries to `metrics.csv` under a summary directory
pub struct CsvSummaryWriter {
    writer: csv::Writer<File>,
}

impl CsvSummaryWriter {
    /// Create `<dir>/metrics.csv`, creating `dir` if needed
    pub fn create<P: AsRef<Path>>(dir: P) -> crate::Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let writer = csv::Writer::from_path(dir.as_ref().join("metrics.csv"))?;
        Ok(Self { writer })
    }
}

impl SummaryWriter for CsvSummaryWriter {
    fn record(&mut self, record: &SummaryRecord) -> crate::Result<()> {
        self.writer.serialize(record)?;
        // Rows are visible while training is still running
        self.writer.flush()?;
        Ok(())
    }
}

/// Discards everything
pub struct NullSummaryWriter;

impl SummaryWriter for NullSummaryWriter {
    fn record(&mut self, _record: &SummaryRecord) -> crate::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_summary_writer() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let summary_dir = dir.path().join("summaries").join("train");

        {
            let mut writer = CsvSummaryWriter::create(&summary_dir)?;
            writer.record(&SummaryRecord::new(1, 1.1, 0.25, Some(0.005)))?;
            writer.record(&SummaryRecord::new(2, 0.9, 0.5, Some(0.0049)))?;
        }

        let mut reader = csv::Reader::from_path(summary_dir.join("metrics.csv"))?;
        let rows: Vec<SummaryRecord> = reader.deserialize().collect::<Result<_, _>>()?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].step, 2);
        assert_eq!(rows[0].learning_rate, Some(0.005));
        Ok(())
    }

    #[test]
    fn test_dev_rows_without_learning_rate() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        {
            let mut writer = CsvSummaryWriter::create(dir.path())?;
            writer.record(&SummaryRecord::new(100, 0.7, 0.6, None))?;
        }

        let mut reader = csv::Reader::from_path(dir.path().join("metrics.csv"))?;
        let rows: Vec<SummaryRecord> = reader.deserialize().collect::<Result<_, _>>()?;
        assert_eq!(rows[0].learning_rate, None);
        Ok(())
    }
}
