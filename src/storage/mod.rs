//! Storage module for persisting harvest data
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - The persistent, deduplicated task queue
//! - The append-only record stream
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{Priority, Stage, TaskState};
use crate::HarvestError;

use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage handle shared by the task queue and the result sink
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Wraps a storage backend for sharing
pub fn share<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// A task about to be inserted into the queue
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub dedup_key: &'a str,
    pub stage: Stage,
    pub url: &'a str,
    /// JSON-serialized task
    pub payload: &'a str,
    pub priority: Priority,
    pub run_id: i64,
}

/// Represents a task in the database
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: i64,
    pub dedup_key: String,
    pub stage: Stage,
    pub url: String,
    pub payload: String,
    pub priority: Priority,
    pub state: TaskState,
    pub run_id: i64,
}

/// Represents a stored record
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub id: i64,
    pub run_id: i64,
    pub task_id: Option<i64>,
    pub url: String,
    pub is_failed: bool,
    pub payload: String,
    pub created_at: String,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// The queue drained
    Completed,
    /// Stopped by the item quota or by an external abort
    Aborted,
    /// Stopped by a fatal error
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
