//! SQLite-based result sink
//!
//! This module appends records to the `records` table of the shared storage
//! backend and reports the prior count a resumed run starts from.

use crate::output::traits::{OutputError, OutputResult, ResultSink};
use crate::output::Record;
use crate::state::TaskState;
use crate::storage::{RunStatus, SharedStorage, Storage};
use std::sync::MutexGuard;

/// SQLite-based result sink
pub struct SqliteResultSink {
    storage: SharedStorage,
    run_id: i64,
}

impl SqliteResultSink {
    pub fn new(storage: SharedStorage, run_id: i64) -> Self {
        Self { storage, run_id }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    fn lock(&self) -> OutputResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
        self.storage
            .lock()
            .map_err(|e| OutputError::Storage(format!("Failed to lock storage: {}", e)))
    }
}

impl ResultSink for SqliteResultSink {
    fn append(&self, record: &Record, task_id: Option<i64>) -> OutputResult<()> {
        let payload = record.to_json()?;

        let mut storage = self.lock()?;
        storage
            .insert_record(
                self.run_id,
                task_id,
                record.url(),
                record.is_failed(),
                &payload,
            )
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        Ok(())
    }

    fn append_for_task(&self, record: &Record, task_id: i64) -> OutputResult<()> {
        let payload = record.to_json()?;
        let state = if record.is_failed() {
            TaskState::Failed
        } else {
            TaskState::Done
        };

        let mut storage = self.lock()?;
        storage
            .insert_record_for_task(
                self.run_id,
                task_id,
                record.url(),
                record.is_failed(),
                &payload,
                state,
            )
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        Ok(())
    }

    fn prior_count(&self) -> OutputResult<u64> {
        let storage = self.lock()?;
        storage
            .count_records(false)
            .map_err(|e| OutputError::Storage(e.to_string()))
    }

    fn finalize(&self, status: RunStatus) -> OutputResult<()> {
        let mut storage = self.lock()?;
        storage
            .finish_run(self.run_id, status)
            .map_err(|e| OutputError::Storage(e.to_string()))
    }
}
