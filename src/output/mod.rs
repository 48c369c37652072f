//! Output module for records, summaries and exports
//!
//! This module handles:
//! - The record types appended to the result store
//! - The SQLite-backed result sink
//! - Run summaries and statistics
//! - JSON Lines export

mod export;
mod record;
mod sqlite_output;
pub mod stats;
mod traits;

pub use export::{export_jsonl, write_jsonl};
pub use record::{DebugInfo, FailedRecord, Record, TitleRecord};
pub use sqlite_output::SqliteResultSink;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{OutputError, OutputResult, ResultSink, RunSummary};

use crate::storage::Storage;
use crate::HarvestError;

/// Generates a summary of the most recent run
pub fn generate_summary(storage: &dyn Storage) -> Result<RunSummary, HarvestError> {
    let run = storage
        .get_latest_run()?
        .ok_or_else(|| HarvestError::Storage("No harvest runs found in database".to_string()))?;

    let duration_seconds = match (
        run.started_at.parse::<chrono::DateTime<chrono::Utc>>(),
        run.finished_at
            .as_deref()
            .map(|f| f.parse::<chrono::DateTime<chrono::Utc>>()),
    ) {
        (Ok(started), Some(Ok(finished))) => Some((finished - started).num_seconds().max(0) as u64),
        _ => None,
    };

    let stats = stats::load_statistics(storage)?;

    Ok(RunSummary {
        run_id: run.id,
        started_at: run.started_at,
        finished_at: run.finished_at,
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash,
        stats,
    })
}
