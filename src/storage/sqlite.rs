//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{Priority, Stage, TaskState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{NewTask, RecordRow, RunRecord, RunStatus, TaskRow};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Raw task columns before their enum fields are decoded
struct RawTask {
    id: i64,
    dedup_key: String,
    stage: String,
    url: String,
    payload: String,
    priority: String,
    state: String,
    run_id: i64,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            dedup_key: row.get(1)?,
            stage: row.get(2)?,
            url: row.get(3)?,
            payload: row.get(4)?,
            priority: row.get(5)?,
            state: row.get(6)?,
            run_id: row.get(7)?,
        })
    }

    fn decode(self) -> StorageResult<TaskRow> {
        let stage = Stage::from_db_string(&self.stage).ok_or(StorageError::InvalidValue {
            column: "tasks.stage",
            value: self.stage.clone(),
        })?;
        let priority =
            Priority::from_db_string(&self.priority).ok_or(StorageError::InvalidValue {
                column: "tasks.priority",
                value: self.priority.clone(),
            })?;
        let state = TaskState::from_db_string(&self.state).ok_or(StorageError::InvalidValue {
            column: "tasks.state",
            value: self.state.clone(),
        })?;

        Ok(TaskRow {
            id: self.id,
            dedup_key: self.dedup_key,
            stage,
            url: self.url,
            payload: self.payload,
            priority,
            state,
            run_id: self.run_id,
        })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Task Queue =====

    fn insert_task(&mut self, task: &NewTask<'_>) -> StorageResult<Option<i64>> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO tasks
             (dedup_key, stage, url, payload, priority, state, run_id, enqueued_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                task.dedup_key,
                task.stage.to_db_string(),
                task.url,
                task.payload,
                task.priority.to_db_string(),
                TaskState::Pending.to_db_string(),
                task.run_id,
                now,
            ],
        )?;

        if inserted == 0 {
            Ok(None)
        } else {
            Ok(Some(self.conn.last_insert_rowid()))
        }
    }

    fn update_task_state(&mut self, task_id: i64, state: TaskState) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE tasks SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state.to_db_string(), now, task_id],
        )?;
        if updated == 0 {
            return Err(StorageError::TaskNotFound(task_id));
        }
        Ok(())
    }

    fn reset_in_flight_tasks(&mut self) -> StorageResult<u64> {
        let now = Utc::now().to_rfc3339();
        let reset = self.conn.execute(
            "UPDATE tasks SET state = ?1, updated_at = ?2 WHERE state = ?3",
            params![
                TaskState::Pending.to_db_string(),
                now,
                TaskState::InFlight.to_db_string()
            ],
        )?;
        Ok(reset as u64)
    }

    fn load_pending_tasks(&self) -> StorageResult<Vec<TaskRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, dedup_key, stage, url, payload, priority, state, run_id
             FROM tasks WHERE state = ?1
             ORDER BY CASE priority WHEN ?2 THEN 0 ELSE 1 END, id ASC",
        )?;

        let raw = stmt
            .query_map(
                params![
                    TaskState::Pending.to_db_string(),
                    Priority::Front.to_db_string()
                ],
                RawTask::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter().map(RawTask::decode).collect()
    }

    fn clear_tasks(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM tasks", [])?;
        Ok(())
    }

    // ===== Records =====

    fn insert_record(
        &mut self,
        run_id: i64,
        task_id: Option<i64>,
        url: &str,
        is_failed: bool,
        payload: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO records (run_id, task_id, url, is_failed, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, task_id, url, is_failed, payload, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn insert_record_for_task(
        &mut self,
        run_id: i64,
        task_id: i64,
        url: &str,
        is_failed: bool,
        payload: &str,
        state: TaskState,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO records (run_id, task_id, url, is_failed, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, task_id, url, is_failed, payload, now],
        )?;
        let record_id = tx.last_insert_rowid();
        let updated = tx.execute(
            "UPDATE tasks SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state.to_db_string(), now, task_id],
        )?;
        if updated == 0 {
            // Dropping the transaction rolls the record back
            return Err(StorageError::TaskNotFound(task_id));
        }
        tx.commit()?;
        Ok(record_id)
    }

    fn count_records(&self, is_failed: bool) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE is_failed = ?1",
            params![is_failed],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn load_records(&self) -> StorageResult<Vec<RecordRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, task_id, url, is_failed, payload, created_at
             FROM records ORDER BY id ASC",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(RecordRow {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    task_id: row.get(2)?,
                    url: row.get(3)?,
                    is_failed: row.get(4)?,
                    payload: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Statistics =====

    fn count_tasks_by_state(&self) -> StorageResult<HashMap<TaskState, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM tasks GROUP BY state")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (state_str, count) in rows {
            if let Some(state) = TaskState::from_db_string(&state_str) {
                counts.insert(state, count as u64);
            }
        }
        Ok(counts)
    }

    fn count_tasks_by_stage(&self) -> StorageResult<HashMap<Stage, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT stage, COUNT(*) FROM tasks GROUP BY stage")?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = HashMap::new();
        for (stage_str, count) in rows {
            if let Some(stage) = Stage::from_db_string(&stage_str) {
                counts.insert(stage, count as u64);
            }
        }
        Ok(counts)
    }

    fn count_pending_with_priority(&self, priority: Priority) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE state = ?1 AND priority = ?2",
            params![
                TaskState::Pending.to_db_string(),
                priority.to_db_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
