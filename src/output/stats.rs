//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! queue and record statistics from the storage layer.

use crate::state::{Priority, Stage, TaskState};
use crate::storage::Storage;
use crate::HarvestError;
use std::collections::HashMap;

/// Harvest statistics summary
#[derive(Debug, Clone, Default)]
pub struct HarvestStatistics {
    /// Successful title records stored
    pub records: u64,

    /// Failure records stored
    pub failed_records: u64,

    /// Count of tasks by state
    pub tasks_by_state: HashMap<TaskState, u64>,

    /// Count of tasks by stage
    pub tasks_by_stage: HashMap<Stage, u64>,

    /// Pending tasks queued at the front (detail lookups)
    pub pending_front: u64,
}

impl HarvestStatistics {
    pub fn total_records(&self) -> u64 {
        self.records + self.failed_records
    }

    pub fn total_tasks(&self) -> u64 {
        self.tasks_by_state.values().sum()
    }

    pub fn tasks_in(&self, state: TaskState) -> u64 {
        self.tasks_by_state.get(&state).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<HarvestStatistics, HarvestError> {
    Ok(HarvestStatistics {
        records: storage.count_records(false)?,
        failed_records: storage.count_records(true)?,
        tasks_by_state: storage.count_tasks_by_state()?,
        tasks_by_stage: storage.count_tasks_by_stage()?,
        pending_front: storage.count_pending_with_priority(Priority::Front)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Records:");
    println!("  Titles: {}", stats.records);
    println!("  Failed: {}", stats.failed_records);
    println!();

    let total = stats.total_tasks();
    println!("Tasks by State ({} total):", total);
    for state in TaskState::all_states() {
        let count = stats.tasks_in(state);
        let percentage = if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    if stats.pending_front > 0 {
        println!("  ({} pending at the front of the queue)", stats.pending_front);
    }
    println!();

    println!("Tasks by Stage:");
    for stage in Stage::all_stages() {
        let count = stats.tasks_by_stage.get(&stage).copied().unwrap_or(0);
        println!("  {}: {}", stage, count);
    }
}
