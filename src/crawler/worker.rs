//! Fetch worker
//!
//! Each worker loops over claim → politeness → fetch → extract → index → enqueue →
//! complete. Workers share nothing but the [`CrawlContext`]; exclusivity comes from the
//! frontier's atomic claim.

use crate::config::{CommitMode, Config};
use crate::crawler::extractor::{extract, ExtractLimits, ExtractedPage};
use crate::crawler::fetcher::{FetchOutcome, PageFetcher};
use crate::crawler::politeness::{Decision, DenyReason, DomainTracker, PolitenessFilter};
use crate::crawler::{sleep_or_cancelled, with_frontier};
use crate::frontier::{ClaimedUrl, FrontierStore, RequeueOutcome};
use crate::index::{Document, IndexSink};
use crate::stats::CrawlCounters;
use crate::NewtError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything the workers of one engine share
pub struct CrawlContext {
    pub(crate) frontier: Arc<dyn FrontierStore>,
    pub(crate) index: Arc<dyn IndexSink>,
    pub(crate) fetcher: Arc<dyn PageFetcher>,
    pub(crate) politeness: PolitenessFilter,
    pub(crate) tracker: DomainTracker,
    pub(crate) counters: Arc<CrawlCounters>,
    pub(crate) limits: ExtractLimits,
    pub(crate) idle_backoff: Duration,
    pub(crate) commit_mode: CommitMode,
}

impl CrawlContext {
    pub fn new(
        config: &Config,
        frontier: Arc<dyn FrontierStore>,
        index: Arc<dyn IndexSink>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            frontier,
            index,
            fetcher,
            politeness: PolitenessFilter::new(config),
            tracker: DomainTracker::new(),
            counters: Arc::new(CrawlCounters::new()),
            limits: ExtractLimits {
                max_content_chars: config.crawler.max_content_chars,
                max_links: config.crawler.max_links_per_page,
            },
            idle_backoff: config.crawler.idle_backoff(),
            commit_mode: config.index.commit_mode,
        }
    }

    pub fn counters(&self) -> &Arc<CrawlCounters> {
        &self.counters
    }
}

/// What a single worker iteration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was claimable
    Idle,

    /// Page indexed, links enqueued, URL completed
    Crawled { url: String, links_added: u64 },

    /// URL deleted after a permanent failure or exhausted retries
    Dropped { url: String },

    /// URL returned to pending after a transient failure
    Requeued { url: String },

    /// URL refused by the politeness filter and deleted without fetching
    Denied { url: String, reason: DenyReason },

    /// Shutdown arrived during the politeness delay; the claim was released
    Released { url: String },
}

/// One of the engine's concurrent crawl loops
pub struct FetchWorker {
    id: usize,
    ctx: Arc<CrawlContext>,
    rng: StdRng,
}

impl FetchWorker {
    pub fn new(id: usize, ctx: Arc<CrawlContext>) -> Self {
        Self {
            id,
            ctx,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs iterations until shutdown; returns the worker id
    ///
    /// Per-iteration errors are logged and never end the loop.
    pub async fn run(mut self, shutdown: CancellationToken) -> usize {
        tracing::debug!(worker = self.id, "Worker started");

        while !shutdown.is_cancelled() {
            match self.run_once(&shutdown).await {
                Ok(CycleOutcome::Idle) => {
                    if sleep_or_cancelled(self.ctx.idle_backoff, &shutdown).await {
                        break;
                    }
                }
                Ok(CycleOutcome::Released { .. }) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(worker = self.id, "Worker iteration failed: {}", e);
                    if sleep_or_cancelled(self.ctx.idle_backoff, &shutdown).await {
                        break;
                    }
                }
            }
        }

        tracing::debug!(worker = self.id, "Worker stopped");
        self.id
    }

    /// Claims and processes at most one URL
    ///
    /// If processing fails unexpectedly the claimed URL is requeued before the error is
    /// reported, so no claim is left behind.
    pub async fn run_once(&mut self, shutdown: &CancellationToken) -> Result<CycleOutcome, NewtError> {
        let Some(claimed) = with_frontier(&self.ctx.frontier, |f| f.claim_one()).await? else {
            return Ok(CycleOutcome::Idle);
        };

        match self.process(&claimed, shutdown).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(
                    worker = self.id,
                    url = %claimed.url,
                    "Processing failed, requeueing: {}",
                    e
                );
                self.requeue(&claimed.url).await
            }
        }
    }

    async fn process(
        &mut self,
        claimed: &ClaimedUrl,
        shutdown: &CancellationToken,
    ) -> Result<CycleOutcome, NewtError> {
        let Ok(url) = Url::parse(&claimed.url) else {
            tracing::warn!(worker = self.id, url = %claimed.url, "Unparseable frontier URL, dropping");
            return self.drop_url(&claimed.url).await;
        };

        let decision = self
            .ctx
            .tracker
            .admit(&self.ctx.politeness, &url, &claimed.domain, &mut self.rng);
        let delay = match decision {
            Decision::Allow { delay } => delay,
            Decision::Deny(reason) => {
                tracing::debug!(worker = self.id, url = %claimed.url, %reason, "Denied");
                let key = claimed.url.clone();
                with_frontier(&self.ctx.frontier, move |f| f.drop_url(&key)).await?;
                self.ctx.counters.record_denied();
                return Ok(CycleOutcome::Denied {
                    url: claimed.url.clone(),
                    reason,
                });
            }
        };

        if !delay.is_zero() && sleep_or_cancelled(delay, shutdown).await {
            let key = claimed.url.clone();
            with_frontier(&self.ctx.frontier, move |f| f.release(&key)).await?;
            tracing::debug!(worker = self.id, url = %claimed.url, "Released on shutdown");
            return Ok(CycleOutcome::Released {
                url: claimed.url.clone(),
            });
        }

        tracing::debug!(worker = self.id, url = %claimed.url, domain = %claimed.domain, "Fetching");
        match self.ctx.fetcher.fetch(&url).await {
            FetchOutcome::Success {
                final_url, body, ..
            } => self.handle_page(claimed, final_url, body).await,
            FetchOutcome::HttpError { status } => {
                tracing::warn!(worker = self.id, url = %claimed.url, status, "HTTP error, dropping");
                self.drop_url(&claimed.url).await
            }
            FetchOutcome::NotHtml { content_type } => {
                tracing::debug!(
                    worker = self.id,
                    url = %claimed.url,
                    %content_type,
                    "Not HTML, dropping"
                );
                self.drop_url(&claimed.url).await
            }
            FetchOutcome::Transient { error } => {
                tracing::warn!(worker = self.id, url = %claimed.url, "Fetch failed: {}", error);
                self.requeue(&claimed.url).await
            }
        }
    }

    async fn handle_page(
        &self,
        claimed: &ClaimedUrl,
        final_url: Url,
        body: Vec<u8>,
    ) -> Result<CycleOutcome, NewtError> {
        let limits = self.ctx.limits;
        let base = final_url.clone();
        let extracted = tokio::task::spawn_blocking(move || extract(&body, &base, &limits)).await?;

        let ExtractedPage {
            title,
            content,
            links,
        } = match extracted {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(worker = self.id, url = %claimed.url, "Extraction failed, dropping: {}", e);
                return self.drop_url(&claimed.url).await;
            }
        };

        self.index_document(Document {
            url: claimed.url.clone(),
            title,
            content,
        })
        .await;

        let links = self.ctx.politeness.select_links(&final_url, links);
        let links_added = with_frontier(&self.ctx.frontier, move |f| {
            let mut added = 0;
            for link in &links {
                if f.insert_if_absent(link)? {
                    added += 1;
                }
            }
            Ok(added)
        })
        .await?;
        self.ctx.counters.record_discovered(links_added);

        let key = claimed.url.clone();
        with_frontier(&self.ctx.frontier, move |f| f.complete(&key)).await?;
        self.ctx.counters.record_crawled();

        tracing::debug!(worker = self.id, url = %claimed.url, links_added, "Crawled");
        Ok(CycleOutcome::Crawled {
            url: claimed.url.clone(),
            links_added,
        })
    }

    /// Hands a document to the index; failures are counted and logged, never raised
    async fn index_document(&self, document: Document) {
        let url = document.url.clone();
        if let Err(e) = self.ctx.index.upsert(document) {
            self.ctx.counters.record_index_failure();
            tracing::error!(worker = self.id, url = %url, "Index write failed: {}", e);
            return;
        }

        if self.ctx.commit_mode == CommitMode::PerDocument {
            let index = Arc::clone(&self.ctx.index);
            match tokio::task::spawn_blocking(move || index.commit()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    self.ctx.counters.record_index_failure();
                    tracing::error!(
                        worker = self.id,
                        url = %url,
                        "Index commit failed, documents kept for the next commit: {}",
                        e
                    );
                }
                Err(e) => tracing::error!(worker = self.id, "Index commit task failed: {}", e),
            }
        }
    }

    async fn drop_url(&self, url: &str) -> Result<CycleOutcome, NewtError> {
        let key = url.to_string();
        with_frontier(&self.ctx.frontier, move |f| f.drop_url(&key)).await?;
        self.ctx.counters.record_dropped();
        Ok(CycleOutcome::Dropped {
            url: url.to_string(),
        })
    }

    async fn requeue(&self, url: &str) -> Result<CycleOutcome, NewtError> {
        let key = url.to_string();
        match with_frontier(&self.ctx.frontier, move |f| f.requeue(&key)).await? {
            RequeueOutcome::Requeued { attempt } => {
                self.ctx.counters.record_requeued();
                tracing::debug!(worker = self.id, url, attempt, "Requeued");
                Ok(CycleOutcome::Requeued {
                    url: url.to_string(),
                })
            }
            RequeueOutcome::Exhausted => {
                self.ctx.counters.record_dropped();
                tracing::warn!(worker = self.id, url, "Retries exhausted, dropping");
                Ok(CycleOutcome::Dropped {
                    url: url.to_string(),
                })
            }
            RequeueOutcome::Missing => {
                tracing::debug!(worker = self.id, url, "Claim no longer held, not requeued");
                Ok(CycleOutcome::Dropped {
                    url: url.to_string(),
                })
            }
        }
    }
}
