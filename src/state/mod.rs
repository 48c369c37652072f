//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Task`: A unit of work tagged with its stage (start, list, detail_aux, detail)
//! - `TaskState`: Lifecycle of a persisted task (pending, in_flight, done, failed)
//! - `RunState`: Emitted-record count checked against the item quota

mod run_state;
mod task;

// Re-export main types
pub use run_state::{RunProgress, RunState};
pub use task::{Priority, Stage, Task, TaskState};
