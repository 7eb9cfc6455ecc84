//! Crawl engine - composes workers, reseeder and commit loop into one run
//!
//! Startup order:
//! 1. Return claims left `processing` by a previous process to `pending`
//! 2. Refresh the seed set
//! 3. Spawn the commit loop, reseeder, progress reporter and N fetch workers
//!
//! On shutdown the workers finish their in-flight fetch, then the commit loop performs
//! a final commit.

use crate::config::{CommitMode, Config};
use crate::crawler::committer::run_commit_loop;
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::reseeder::{parse_seeds, Reseeder};
use crate::crawler::worker::{CrawlContext, FetchWorker};
use crate::crawler::{sleep_or_cancelled, with_frontier};
use crate::frontier::{FrontierPolicy, FrontierStore, SqliteFrontier};
use crate::index::{IndexSink, TantivyIndex};
use crate::stats::{CounterSnapshot, CrawlCounters};
use crate::state::UrlState;
use crate::NewtError;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How often the progress reporter logs
const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

/// Per-document mode retries failed inline commits no more often than this
const COMMIT_RETRY_FLOOR: Duration = Duration::from_secs(30);

/// Main crawler structure
pub struct CrawlEngine {
    config: Arc<Config>,
    ctx: Arc<CrawlContext>,
}

impl CrawlEngine {
    /// Opens the on-disk frontier and index and builds the HTTP fetcher
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Ready to run
    /// * `Err(NewtError)` - The frontier, index or HTTP client could not be set up
    pub fn open(config: Config) -> Result<Self, NewtError> {
        let frontier = SqliteFrontier::open(
            Path::new(&config.frontier.path),
            FrontierPolicy::from_config(&config.crawler),
        )?;
        let index = TantivyIndex::open_or_create(
            Path::new(&config.index.path),
            config.index.writer_heap_bytes,
            config.index.max_pending_documents,
        )?;
        let fetcher = HttpFetcher::new(&config.http)?;

        Ok(Self::from_parts(
            config,
            Arc::new(frontier),
            Arc::new(index),
            Arc::new(fetcher),
        ))
    }

    /// Builds an engine over caller-supplied collaborators
    pub fn from_parts(
        config: Config,
        frontier: Arc<dyn FrontierStore>,
        index: Arc<dyn IndexSink>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        let ctx = CrawlContext::new(&config, frontier, index, fetcher);
        Self {
            config: Arc::new(config),
            ctx: Arc::new(ctx),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn counters(&self) -> Arc<CrawlCounters> {
        Arc::clone(&self.ctx.counters)
    }

    /// A worker over this engine's shared state, for driving single iterations
    pub fn worker(&self, id: usize) -> FetchWorker {
        FetchWorker::new(id, Arc::clone(&self.ctx))
    }

    /// A reseeder for the configured seed set
    pub fn reseeder(&self) -> Reseeder {
        Reseeder::new(
            Arc::clone(&self.ctx.frontier),
            parse_seeds(&self.config.seeds),
            self.config.reseed.interval(),
        )
    }

    /// Deletes every frontier record (`--fresh`)
    pub async fn clear_frontier(&self) -> Result<(), NewtError> {
        with_frontier(&self.ctx.frontier, |f| f.clear()).await
    }

    /// Runs the crawl until `shutdown` is cancelled
    ///
    /// Returns the final counters. Only startup failures are returned as errors.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<CounterSnapshot, NewtError> {
        if self.config.http.accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled (accept-invalid-certs)");
        }

        let recovered = with_frontier(&self.ctx.frontier, |f| f.recover_in_flight()).await?;
        if recovered > 0 {
            tracing::info!("Recovered {} in-flight URLs from a previous run", recovered);
        }

        let reseeder = self.reseeder();
        let seeded = reseeder.reseed_once().await?;
        tracing::info!(
            inserted = seeded.inserted,
            revived = seeded.revived,
            "Seeded frontier"
        );

        let commit_stop = CancellationToken::new();
        let committer = tokio::spawn(run_commit_loop(
            Arc::clone(&self.ctx.index),
            self.commit_interval(),
            commit_stop.clone(),
        ));
        let reseed_task = tokio::spawn(reseeder.run(shutdown.clone()));
        let reporter = tokio::spawn(report_progress(Arc::clone(&self.ctx), shutdown.clone()));

        let worker_count = self.config.crawler.workers as usize;
        tracing::info!("Starting {} fetch workers", worker_count);
        self.supervise_workers(worker_count, &shutdown).await;

        // Workers are done; nothing can be upserted after this point
        commit_stop.cancel();
        for (name, task) in [
            ("commit loop", committer),
            ("reseeder", reseed_task),
            ("progress reporter", reporter),
        ] {
            if let Err(e) = task.await {
                tracing::error!("{} task failed: {}", name, e);
            }
        }

        let snapshot = self.ctx.counters.snapshot();
        tracing::info!(
            crawled = snapshot.crawled,
            dropped = snapshot.dropped,
            requeued = snapshot.requeued,
            denied = snapshot.denied,
            discovered = snapshot.discovered,
            index_failures = snapshot.index_failures,
            "Crawl stopped"
        );
        Ok(snapshot)
    }

    /// In per-document mode the loop only retries commits that failed inline
    fn commit_interval(&self) -> Duration {
        match self.config.index.commit_mode {
            CommitMode::Periodic => self.config.index.commit_interval(),
            CommitMode::PerDocument => self.config.index.commit_interval().max(COMMIT_RETRY_FLOOR),
        }
    }

    /// Runs `count` workers until shutdown, replacing any that panic
    async fn supervise_workers(&self, count: usize, shutdown: &CancellationToken) {
        let mut workers = JoinSet::new();
        for id in 0..count {
            workers.spawn(self.worker(id).run(shutdown.clone()));
        }
        let mut next_id = count;

        while let Some(result) = workers.join_next().await {
            match result {
                Ok(id) => tracing::debug!(worker = id, "Worker exited"),
                Err(e) if e.is_panic() && !shutdown.is_cancelled() => {
                    tracing::error!("Worker panicked, starting a replacement: {}", e);
                    workers.spawn(self.worker(next_id).run(shutdown.clone()));
                    next_id += 1;
                }
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }
    }
}

/// Logs counters and throughput until shutdown
async fn report_progress(ctx: Arc<CrawlContext>, shutdown: CancellationToken) {
    let start = Instant::now();
    while !sleep_or_cancelled(PROGRESS_INTERVAL, &shutdown).await {
        let snapshot = ctx.counters.snapshot();
        let rate = snapshot.crawled as f64 / start.elapsed().as_secs_f64().max(1.0);
        let pending = with_frontier(&ctx.frontier, |f| f.count_by_state(UrlState::Pending))
            .await
            .unwrap_or(0);
        tracing::info!(
            crawled = snapshot.crawled,
            dropped = snapshot.dropped,
            requeued = snapshot.requeued,
            discovered = snapshot.discovered,
            pending,
            buffered = ctx.index.pending_len(),
            domains = ctx.tracker.len(),
            "Progress: {:.2} pages/sec",
            rate
        );
    }
}
