//! Output traits and types
//!
//! This module defines the result sink interface and the run summary
//! produced from the database.

use crate::output::stats::HarvestStatistics;
use crate::output::Record;
use crate::storage::RunStatus;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only destination of records
pub trait ResultSink {
    /// Appends one record produced by the given task
    fn append(&self, record: &Record, task_id: Option<i64>) -> OutputResult<()>;

    /// Appends the record of a task and marks that task processed
    ///
    /// The task becomes `failed` for failure records and `done` otherwise;
    /// the record and the state change are stored atomically.
    fn append_for_task(&self, record: &Record, task_id: i64) -> OutputResult<()>;

    /// Number of successful records already stored
    ///
    /// Failure records are not counted; this is the starting point of the
    /// quota for a resumed run.
    fn prior_count(&self) -> OutputResult<u64>;

    /// Records the final status of the run
    fn finalize(&self, status: RunStatus) -> OutputResult<()>;
}

/// Summary of one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,
    pub stats: HarvestStatistics,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of records that are not failure records, as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.stats.total_records();
        if total == 0 {
            return 0.0;
        }
        (self.stats.records as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_new() {
        let summary = RunSummary::new();
        assert_eq!(summary.stats.records, 0);
        assert_eq!(summary.success_rate(), 0.0);
    }

    #[test]
    fn test_success_rate() {
        let mut summary = RunSummary::new();
        summary.stats.records = 80;
        summary.stats.failed_records = 20;

        assert!((summary.success_rate() - 80.0).abs() < 0.01);
    }
}
