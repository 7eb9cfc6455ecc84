//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with error classification
//! - HTML text and link extraction
//! - Politeness and domain-diversity filtering
//! - The fetch workers, reseeder and commit loop
//! - Overall crawl coordination by [`CrawlEngine`]

mod committer;
mod engine;
mod extractor;
mod fetcher;
mod politeness;
mod reseeder;
mod worker;

pub use committer::{commit_once, run_commit_loop};
pub use engine::CrawlEngine;
pub use extractor::{extract, ExtractError, ExtractLimits, ExtractedPage};
pub use fetcher::{build_http_client, FetchOutcome, HttpFetcher, PageFetcher};
pub use politeness::{Decision, DenyReason, DomainTracker, PolitenessFilter};
pub use reseeder::{parse_seeds, ReseedReport, Reseeder};
pub use worker::{CrawlContext, CycleOutcome, FetchWorker};

use crate::frontier::{FrontierResult, FrontierStore};
use crate::NewtError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs a frontier operation on the blocking pool
///
/// Frontier backends hold a mutex (and for SQLite do disk I/O), so async tasks never
/// call them inline.
pub(crate) async fn with_frontier<T, F>(
    frontier: &Arc<dyn FrontierStore>,
    op: F,
) -> Result<T, NewtError>
where
    F: FnOnce(&dyn FrontierStore) -> FrontierResult<T> + Send + 'static,
    T: Send + 'static,
{
    let frontier = Arc::clone(frontier);
    let result = tokio::task::spawn_blocking(move || op(frontier.as_ref())).await?;
    Ok(result?)
}

/// Sleeps for `duration`, returning true if shutdown was requested first
pub(crate) async fn sleep_or_cancelled(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
