//! Crawler module for staged page harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and proxy support
//! - The persistent, deduplicated work queue
//! - Stage routing of fetched documents
//! - Overall run coordination, quota and abort handling

mod coordinator;
mod fetcher;
mod queue;
mod router;

pub use coordinator::{Coordinator, RunHandle, RunReport};
pub use fetcher::{build_http_client, FetchError, FetchFailure, FetchedPage, Fetcher, HttpFetcher};
pub use queue::{QueuedTask, WorkQueue};
pub use router::{RouteContext, StageRouter};
