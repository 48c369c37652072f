//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{Priority, Stage, TaskState};
use crate::storage::{NewTask, RecordRow, RunRecord, RunStatus, TaskRow};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester: run
/// bookkeeping, the persistent task queue, and the append-only record stream.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Task Queue =====

    /// Inserts a task unless its dedup key is already known
    ///
    /// Returns the new task ID, or `None` when the key was present (pending,
    /// in flight, or already processed).
    fn insert_task(&mut self, task: &NewTask<'_>) -> StorageResult<Option<i64>>;

    /// Moves a task to a new state
    fn update_task_state(&mut self, task_id: i64, state: TaskState) -> StorageResult<()>;

    /// Returns tasks left in flight by an interrupted run to pending
    ///
    /// Returns the number of tasks reset.
    fn reset_in_flight_tasks(&mut self) -> StorageResult<u64>;

    /// Loads all pending tasks, front priority first, then in insertion order
    fn load_pending_tasks(&self) -> StorageResult<Vec<TaskRow>>;

    /// Removes every task, forgetting all dedup keys
    fn clear_tasks(&mut self) -> StorageResult<()>;

    // ===== Records =====

    /// Appends a serialized record
    fn insert_record(
        &mut self,
        run_id: i64,
        task_id: Option<i64>,
        url: &str,
        is_failed: bool,
        payload: &str,
    ) -> StorageResult<i64>;

    /// Appends a record and moves its task to `state` in one transaction
    ///
    /// Either both writes land or neither does, so a crash between them can
    /// never leave a stored record behind a task that is still redelivered.
    fn insert_record_for_task(
        &mut self,
        run_id: i64,
        task_id: i64,
        url: &str,
        is_failed: bool,
        payload: &str,
        state: TaskState,
    ) -> StorageResult<i64>;

    /// Counts successful (`false`) or failure (`true`) records
    fn count_records(&self, is_failed: bool) -> StorageResult<u64>;

    /// Loads every record in append order
    fn load_records(&self) -> StorageResult<Vec<RecordRow>>;

    // ===== Statistics =====

    /// Counts tasks by state
    fn count_tasks_by_state(&self) -> StorageResult<HashMap<TaskState, u64>>;

    /// Counts tasks by stage
    fn count_tasks_by_stage(&self) -> StorageResult<HashMap<Stage, u64>>;

    /// Counts tasks queued with the given priority that are still pending
    fn count_pending_with_priority(&self, priority: Priority) -> StorageResult<u64>;
}
