//! Periodic re-injection of the seed set
//!
//! Hubs like news front pages change constantly, so once they are crawled they are
//! brought back to pending every reseed interval. Seeds that are pending or being
//! fetched are left as they are.

use crate::crawler::with_frontier;
use crate::frontier::{FrontierStore, RefreshOutcome};
use crate::url::canonicalize_url;
use crate::NewtError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

/// What one reseed pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReseedReport {
    /// Seeds that had no record
    pub inserted: u64,

    /// Crawled seeds returned to pending
    pub revived: u64,

    /// Seeds already pending or in flight
    pub unchanged: u64,
}

/// Canonicalizes configured seeds, skipping (and logging) any that are invalid
pub fn parse_seeds(seeds: &[String]) -> Vec<Url> {
    seeds
        .iter()
        .filter_map(|seed| match canonicalize_url(seed) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(seed = %seed, "Skipping invalid seed: {}", e);
                None
            }
        })
        .collect()
}

/// Re-injects a fixed seed set into the frontier
pub struct Reseeder {
    frontier: Arc<dyn FrontierStore>,
    seeds: Arc<Vec<Url>>,
    interval: Duration,
}

impl Reseeder {
    pub fn new(frontier: Arc<dyn FrontierStore>, seeds: Vec<Url>, interval: Duration) -> Self {
        Self {
            frontier,
            seeds: Arc::new(seeds),
            interval,
        }
    }

    /// Refreshes every seed once
    pub async fn reseed_once(&self) -> Result<ReseedReport, NewtError> {
        let seeds = Arc::clone(&self.seeds);
        with_frontier(&self.frontier, move |f| {
            let mut report = ReseedReport::default();
            for seed in seeds.iter() {
                match f.refresh(seed)? {
                    RefreshOutcome::Inserted => report.inserted += 1,
                    RefreshOutcome::Revived => report.revived += 1,
                    RefreshOutcome::Unchanged => report.unchanged += 1,
                }
            }
            Ok(report)
        })
        .await
    }

    /// Reseeds every interval until shutdown
    ///
    /// The first pass happens one interval after start; the engine seeds at startup
    /// itself.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.reseed_once().await {
                Ok(report) => tracing::info!(
                    inserted = report.inserted,
                    revived = report.revived,
                    unchanged = report.unchanged,
                    "Reseeded frontier"
                ),
                Err(e) => tracing::error!("Reseed failed: {}", e),
            }
        }

        tracing::debug!("Reseeder stopped");
    }
}
