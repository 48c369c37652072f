//! Persistent, deduplicated work queue
//!
//! This module handles:
//! - Front/normal priority ordering, first-in first-out within a priority
//! - Deduplication by (stage, normalized URL), across runs
//! - Write-through persistence so an interrupted run can resume
//! - Redelivery of tasks left in flight by a crashed run

use crate::state::{Priority, Task, TaskState};
use crate::storage::{NewTask, SharedStorage, Storage};
use crate::{HarvestError, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard};

/// A task waiting in the queue
#[derive(Debug, Clone)]
pub struct QueuedTask {
    /// Persistent task ID (insertion order)
    pub id: i64,
    pub task: Task,
    pub priority: Priority,
}

// Front before Normal; within a priority the lower (older) id pops first
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for QueuedTask {}

/// Work queue backed by the `tasks` table
///
/// The in-memory heap holds exactly the pending tasks; every state change is
/// written through to storage before it is observed in memory.
pub struct WorkQueue {
    storage: SharedStorage,
    run_id: i64,
    pending: Mutex<BinaryHeap<QueuedTask>>,
}

impl WorkQueue {
    /// Creates an empty queue for a run
    pub fn new(storage: SharedStorage, run_id: i64) -> Self {
        Self {
            storage,
            run_id,
            pending: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Reloads the pending tasks of earlier runs
    ///
    /// Tasks that were in flight when a previous run stopped are returned to
    /// pending first. Returns the queue and the number of redelivered tasks.
    pub fn restore(storage: SharedStorage, run_id: i64) -> Result<(Self, u64)> {
        let (redelivered, rows) = {
            let mut guard = lock_storage(&storage)?;
            let redelivered = guard.reset_in_flight_tasks()?;
            let rows = guard.load_pending_tasks()?;
            (redelivered, rows)
        };

        let mut heap = BinaryHeap::with_capacity(rows.len());
        for row in rows {
            let task: Task = serde_json::from_str(&row.payload)?;
            heap.push(QueuedTask {
                id: row.id,
                task,
                priority: row.priority,
            });
        }

        let queue = Self {
            storage,
            run_id,
            pending: Mutex::new(heap),
        };
        Ok((queue, redelivered))
    }

    /// Adds a task unless its dedup key was seen before
    ///
    /// Returns `true` when the task was queued.
    pub fn enqueue(&self, task: Task, priority: Priority) -> Result<bool> {
        let dedup_key = task.dedup_key()?;
        let payload = serde_json::to_string(&task)?;

        let inserted = lock_storage(&self.storage)?.insert_task(&NewTask {
            dedup_key: &dedup_key,
            stage: task.stage(),
            url: task.url().as_str(),
            payload: &payload,
            priority,
            run_id: self.run_id,
        })?;

        match inserted {
            Some(id) => {
                self.lock_pending()?.push(QueuedTask { id, task, priority });
                Ok(true)
            }
            None => {
                tracing::trace!("Skipping duplicate task {}", dedup_key);
                Ok(false)
            }
        }
    }

    /// Takes the next task and marks it in flight
    pub fn dequeue(&self) -> Result<Option<QueuedTask>> {
        let next = self.lock_pending()?.pop();

        if let Some(queued) = &next {
            lock_storage(&self.storage)?.update_task_state(queued.id, TaskState::InFlight)?;
        }

        Ok(next)
    }

    /// Records the terminal state of a dispatched task
    pub fn complete(&self, task_id: i64, state: TaskState) -> Result<()> {
        lock_storage(&self.storage)?.update_task_state(task_id, state)?;
        Ok(())
    }

    /// Returns a dispatched task to pending for the next run
    ///
    /// The task is not offered again by this queue instance.
    pub fn release(&self, task_id: i64) -> Result<()> {
        lock_storage(&self.storage)?.update_task_state(task_id, TaskState::Pending)?;
        Ok(())
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.pending.lock().map(|heap| heap.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_pending(&self) -> Result<MutexGuard<'_, BinaryHeap<QueuedTask>>> {
        self.pending
            .lock()
            .map_err(|e| HarvestError::Storage(format!("Failed to lock queue: {}", e)))
    }
}

fn lock_storage(storage: &SharedStorage) -> Result<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage
        .lock()
        .map_err(|e| HarvestError::Storage(format!("Failed to lock storage: {}", e)))
}
