//! Crawler coordinator - main run orchestration logic
//!
//! This module contains the run loop that coordinates all aspects of a
//! harvest, including:
//! - Opening storage and recording the run
//! - Restoring and seeding the work queue
//! - Keeping a bounded set of fetches in flight
//! - Routing fetched pages and recording failures
//! - Enforcing the item quota and handling aborts

use crate::config::{validate, Config};
use crate::crawler::fetcher::{FetchFailure, FetchedPage, Fetcher, HttpFetcher};
use crate::crawler::queue::{QueuedTask, WorkQueue};
use crate::crawler::router::{RouteContext, StageRouter};
use crate::extract::{Document, OutputExtension, SelectorExtension};
use crate::output::{DebugInfo, FailedRecord, Record, ResultSink, SqliteResultSink};
use crate::state::{Priority, RunProgress, RunState, Task, TaskState};
use crate::storage::{open_storage, share, RunStatus, SharedStorage};
use crate::{HarvestError, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Cloneable handle that stops a running harvest
///
/// Aborting stops dispatch and tells in-flight fetches to give up retrying.
/// Pages that arrive afterwards are not routed; their tasks stay pending for
/// the next run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: i64,
    pub status: RunStatus,
    /// Successful records in the store, prior runs included
    pub total_records: u64,
    /// Tasks routed or recorded as failed during this run
    pub tasks_processed: u64,
    pub failures: u64,
    /// Tasks handed back to pending after an abort
    pub released: u64,
}

/// Main coordinator structure
pub struct Coordinator<F: Fetcher = HttpFetcher> {
    config: Arc<Config>,
    config_hash: String,
    fresh: bool,
    storage: SharedStorage,
    fetcher: Arc<F>,
    router: StageRouter,
    cancel: CancellationToken,
}

impl Coordinator<HttpFetcher> {
    /// Creates a coordinator fetching over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash of the configuration file, recorded on the run
    /// * `fresh` - Whether to discard the persisted queue
    pub fn new(config: Config, config_hash: String, fresh: bool) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(&config)?;
        Self::with_fetcher(config, config_hash, fresh, fetcher)
    }
}

impl<F: Fetcher> Coordinator<F> {
    /// Creates a coordinator around any fetcher
    ///
    /// The configuration is validated and its declarative extension compiled
    /// here, so configuration errors surface before anything is seeded.
    pub fn with_fetcher(config: Config, config_hash: String, fresh: bool, fetcher: F) -> Result<Self> {
        validate(&config)?;

        let extension: Option<Arc<dyn OutputExtension>> = match &config.extension {
            Some(ext) if !ext.fields.is_empty() => {
                Some(Arc::new(SelectorExtension::compile(&ext.fields)?) as Arc<dyn OutputExtension>)
            }
            _ => None,
        };

        let storage = open_storage(Path::new(&config.output.database_path))?;
        let router = StageRouter::new(config.run.prioritize_details, extension);

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            fresh,
            storage: share(storage),
            fetcher: Arc::new(fetcher),
            router,
            cancel: CancellationToken::new(),
        })
    }

    /// Registers an in-process output extension
    ///
    /// Replaces any extension compiled from the configuration.
    pub fn with_extension<E: OutputExtension + 'static>(mut self, extension: E) -> Self {
        self.router = StageRouter::new(self.config.run.prioritize_details, Some(Arc::new(extension)));
        self
    }

    pub fn abort_handle(&self) -> RunHandle {
        RunHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Storage shared by the queue and the result sink
    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    /// Runs the harvest until the queue drains, the quota is reached or the
    /// run is aborted
    ///
    /// An extension error fails the run: it is recorded as `failed` and the
    /// error is returned once in-flight fetches have drained.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = self.lock_storage()?.create_run(&self.config_hash)?;
        tracing::info!("Starting harvest run {}", run_id);

        if self.fresh {
            self.lock_storage()?.clear_tasks()?;
            tracing::info!("Cleared persisted queue for a fresh run");
        }

        let (queue, redelivered) = WorkQueue::restore(self.storage(), run_id)?;
        if redelivered > 0 {
            tracing::info!("Redelivering {} tasks left in flight", redelivered);
        }
        tracing::info!("Restored {} pending tasks", queue.len());

        let sink = SqliteResultSink::new(self.storage(), run_id);
        let mut state = RunState::from_prior(sink.prior_count()?, self.config.run.max_items);
        let mut report = RunReport {
            run_id,
            status: RunStatus::Running,
            total_records: state.emitted(),
            tasks_processed: 0,
            failures: 0,
            released: 0,
        };

        if state.is_exhausted() {
            tracing::info!("Item quota already reached ({}), nothing to do", state);
            sink.finalize(RunStatus::Aborted)?;
            report.status = RunStatus::Aborted;
            return Ok(report);
        }

        self.seed(&queue)?;

        let max_in_flight = self.config.run.max_concurrent_pages_open.max(1) as usize;
        let mut in_flight: JoinSet<(QueuedTask, std::result::Result<FetchedPage, FetchFailure>)> =
            JoinSet::new();
        let mut fatal: Option<HarvestError> = None;
        let start_time = std::time::Instant::now();

        loop {
            while !self.cancel.is_cancelled() && in_flight.len() < max_in_flight {
                let Some(queued) = queue.dequeue()? else {
                    break;
                };

                tracing::debug!("Dispatching {} {}", queued.task.stage(), queued.task.url());
                let fetcher = Arc::clone(&self.fetcher);
                let cancel = self.cancel.clone();
                in_flight.spawn(async move {
                    let result = fetcher.fetch(queued.task.url(), &cancel).await;
                    (queued, result)
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            let (queued, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // The task stays in flight and is redelivered next run
                    tracing::error!("Fetch task did not complete: {}", e);
                    continue;
                }
            };

            if self.cancel.is_cancelled() {
                queue.release(queued.id)?;
                report.released += 1;
                continue;
            }

            report.tasks_processed += 1;
            match self.handle_fetched(&queue, &sink, &mut state, queued, result) {
                Ok(false) => {}
                Ok(true) => report.failures += 1,
                Err(e) => {
                    tracing::error!("Harvest run {} failed: {}", run_id, e);
                    fatal = Some(e);
                    self.cancel.cancel();
                }
            }

            if report.tasks_processed % 10 == 0 {
                let rate = report.tasks_processed as f64 / start_time.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {} tasks processed, {} queued, {} in flight, {} records, {:.2} tasks/sec",
                    report.tasks_processed,
                    queue.len(),
                    in_flight.len(),
                    state,
                    rate
                );
            }
        }

        report.total_records = state.emitted();
        report.status = if fatal.is_some() {
            RunStatus::Failed
        } else if self.cancel.is_cancelled() {
            RunStatus::Aborted
        } else {
            RunStatus::Completed
        };
        sink.finalize(report.status)?;

        tracing::info!(
            "Harvest run {} {}: {} tasks processed, {} failures, {} records in {:?}",
            run_id,
            report.status.to_db_string(),
            report.tasks_processed,
            report.failures,
            state,
            start_time.elapsed()
        );

        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Queues the configured start URLs
    fn seed(&self, queue: &WorkQueue) -> Result<()> {
        for start in &self.config.run.start_urls {
            let (task, priority) = Task::seed(Url::parse(&start.url)?)?;
            if queue.enqueue(task, priority)? {
                tracing::info!("Seeded {}", start.url);
            } else {
                tracing::debug!("Start URL {} already queued or processed", start.url);
            }
        }
        Ok(())
    }

    /// Routes one completed fetch
    ///
    /// Returns `true` when a failure record was written instead.
    fn handle_fetched(
        &self,
        queue: &WorkQueue,
        sink: &SqliteResultSink,
        state: &mut RunState,
        queued: QueuedTask,
        result: std::result::Result<FetchedPage, FetchFailure>,
    ) -> Result<bool> {
        let mut debug_info = DebugInfo {
            request_id: Some(queued.id),
            url: queued.task.url().to_string(),
            method: "GET".to_string(),
            ..Default::default()
        };

        let page = match result {
            Ok(page) => page,
            Err(failure) => {
                debug_info.retry_count = failure.attempts.saturating_sub(1);
                debug_info.status_code = failure.error.status_code();
                debug_info.error_messages = failure.error_messages;
                tracing::warn!("Failed to fetch {}: {}", debug_info.url, failure.error);
                record_failure(sink, queued.id, debug_info)?;
                return Ok(true);
            }
        };

        debug_info.loaded_url = page.final_url;
        debug_info.status_code = Some(page.status_code);
        debug_info.retry_count = page.attempts.saturating_sub(1);

        if page.body.trim().is_empty() {
            debug_info.error_messages.push("empty document".to_string());
            tracing::warn!("Empty document at {}", debug_info.url);
            record_failure(sink, queued.id, debug_info)?;
            return Ok(true);
        }

        let doc = Document::parse(&page.body);
        let mut ctx = RunContext {
            queue,
            sink,
            state,
            cancel: &self.cancel,
            task_id: queued.id,
        };

        if let Err(e) = self.router.route(&queued.task, &doc, debug_info, &mut ctx) {
            queue.release(queued.id)?;
            return Err(e);
        }

        queue.complete(queued.id, TaskState::Done)?;
        Ok(false)
    }

    fn lock_storage(&self) -> Result<std::sync::MutexGuard<'_, dyn crate::storage::Storage + Send + 'static>> {
        self.storage
            .lock()
            .map_err(|e| HarvestError::Storage(format!("Failed to lock storage: {}", e)))
    }
}

/// Writes a failure record; the task is marked failed in the same transaction
fn record_failure(sink: &SqliteResultSink, task_id: i64, debug_info: DebugInfo) -> Result<()> {
    sink.append_for_task(&FailedRecord::new(debug_info).into(), task_id)?;
    Ok(())
}

/// Router view of the running harvest
struct RunContext<'a> {
    queue: &'a WorkQueue,
    sink: &'a SqliteResultSink,
    state: &'a mut RunState,
    cancel: &'a CancellationToken,
    task_id: i64,
}

impl RouteContext for RunContext<'_> {
    fn enqueue(&mut self, task: Task, priority: Priority) -> Result<bool> {
        self.queue.enqueue(task, priority)
    }

    fn emit(&mut self, record: Record) -> Result<RunProgress> {
        // Emissions are serialized on the run loop, so this never overshoots
        if self.state.is_exhausted() {
            return Ok(RunProgress::QuotaReached);
        }
        // Commits together with the task's `done` state
        self.sink.append_for_task(&record, self.task_id)?;
        Ok(self.state.record_emission())
    }

    fn abort(&mut self) {
        self.cancel.cancel();
    }
}
