//! Stage router - decides what a fetched page produces
//!
//! Each stage maps a parsed document to follow-on tasks and/or a record:
//!
//! | Stage | Produces |
//! |-------|----------|
//! | start | listing pages for every further result offset, then the list step |
//! | list | one parental-guide lookup per linked title |
//! | detail_aux | the title page, carrying the certificate |
//! | detail | one record |
//!
//! Routing never awaits; the caller owns the document for the duration of one
//! call.

use crate::extract::{
    extract_certificate, extract_title_record, item_title_ids, page_offsets, total_result_count,
    Document, OutputExtension,
};
use crate::output::{DebugInfo, Record};
use crate::state::{Priority, RunProgress, Task};
use crate::url::{with_query_param, TitleId};
use crate::{HarvestError, Result};
use std::sync::Arc;
use url::Url;

/// Capabilities the router needs from the running crawl
pub trait RouteContext {
    /// Queues a follow-on task; `false` when it was a duplicate
    fn enqueue(&mut self, task: Task, priority: Priority) -> Result<bool>;

    /// Appends a record to the result stream and counts it against the quota
    fn emit(&mut self, record: Record) -> Result<RunProgress>;

    /// Stops the run; nothing further is dispatched
    fn abort(&mut self);
}

/// Routes fetched documents according to their task's stage
#[derive(Clone)]
pub struct StageRouter {
    prioritize_details: bool,
    extension: Option<Arc<dyn OutputExtension>>,
}

impl StageRouter {
    pub fn new(prioritize_details: bool, extension: Option<Arc<dyn OutputExtension>>) -> Self {
        Self {
            prioritize_details,
            extension,
        }
    }

    /// Handles one fetched document
    ///
    /// `debug` describes the request and is attached to an emitted record.
    /// Fails only on queue/storage errors and on extension errors, both of
    /// which end the run.
    pub fn route(
        &self,
        task: &Task,
        doc: &Document,
        debug: DebugInfo,
        ctx: &mut dyn RouteContext,
    ) -> Result<()> {
        match task {
            Task::Start { url } => {
                self.route_start(url, doc, ctx)?;
                self.route_list(url, doc, ctx)
            }
            Task::List { url } => self.route_list(url, doc, ctx),
            Task::DetailAux { url, title_id } => self.route_detail_aux(url, title_id, doc, ctx),
            Task::Detail {
                url, certificate, ..
            } => self.route_detail(url, certificate, doc, debug, ctx),
        }
    }

    fn route_start(&self, url: &Url, doc: &Document, ctx: &mut dyn RouteContext) -> Result<()> {
        let total = match total_result_count(doc) {
            Some(total) => total,
            None => {
                tracing::debug!("No result count on {}, treating as a single page", url);
                return Ok(());
            }
        };

        let offsets = page_offsets(total);
        tracing::debug!(
            "{} reports {} results, queuing {} more listing pages",
            url,
            total,
            offsets.len()
        );

        for offset in offsets {
            let page_url = with_query_param(url, "start", &offset.to_string());
            ctx.enqueue(Task::List { url: page_url }, Priority::Normal)?;
        }

        Ok(())
    }

    fn route_list(&self, url: &Url, doc: &Document, ctx: &mut dyn RouteContext) -> Result<()> {
        let priority = if self.prioritize_details {
            Priority::Front
        } else {
            Priority::Normal
        };

        let mut queued = 0;
        for title_id in item_title_ids(doc) {
            let guide_url = title_id.parental_guide_url(url)?;
            if ctx.enqueue(
                Task::DetailAux {
                    url: guide_url,
                    title_id,
                },
                priority,
            )? {
                queued += 1;
            }
        }

        tracing::debug!("Queued {} titles from {}", queued, url);
        Ok(())
    }

    fn route_detail_aux(
        &self,
        url: &Url,
        title_id: &TitleId,
        doc: &Document,
        ctx: &mut dyn RouteContext,
    ) -> Result<()> {
        let certificate = extract_certificate(doc);
        let title_url = title_id.title_url(url)?;

        ctx.enqueue(
            Task::Detail {
                url: title_url,
                title_id: title_id.clone(),
                certificate,
            },
            Priority::Front,
        )?;

        Ok(())
    }

    fn route_detail(
        &self,
        url: &Url,
        certificate: &str,
        doc: &Document,
        debug: DebugInfo,
        ctx: &mut dyn RouteContext,
    ) -> Result<()> {
        let mut record = extract_title_record(doc, url.as_str(), certificate, debug);

        if let Some(extension) = &self.extension {
            let fields = extension
                .extend(doc)
                .map_err(|source| HarvestError::Extension {
                    url: url.to_string(),
                    source,
                })?;
            record.apply_extension(fields);
        }

        if ctx.emit(record.into())? == RunProgress::QuotaReached {
            tracing::info!("Item quota reached, aborting run");
            ctx.abort();
        }

        Ok(())
    }
}
