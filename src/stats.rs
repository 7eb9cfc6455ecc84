//! Crawl counters and frontier statistics
//!
//! [`CrawlCounters`] are shared by every worker of a running engine. The statistics
//! report is what `newt --stats` prints from the on-disk frontier and index.

use crate::frontier::FrontierStore;
use crate::state::UrlState;
use crate::NewtError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the fetch workers
#[derive(Debug, Default)]
pub struct CrawlCounters {
    crawled: AtomicU64,
    dropped: AtomicU64,
    requeued: AtomicU64,
    denied: AtomicU64,
    discovered: AtomicU64,
    index_failures: AtomicU64,
}

/// Point-in-time copy of [`CrawlCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Pages fetched, extracted and completed
    pub crawled: u64,

    /// URLs deleted after a permanent failure or exhausted retries
    pub dropped: u64,

    pub requeued: u64,

    /// URLs refused by the politeness filter at claim time
    pub denied: u64,

    /// New frontier records created from discovered links
    pub discovered: u64,

    pub index_failures: u64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_crawled(&self) {
        self.crawled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovered(&self, count: u64) {
        self.discovered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_index_failure(&self) {
        self.index_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            crawled: self.crawled.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            discovered: self.discovered.load(Ordering::Relaxed),
            index_failures: self.index_failures.load(Ordering::Relaxed),
        }
    }
}

/// Frontier and index summary
#[derive(Debug, Clone)]
pub struct FrontierStatistics {
    /// Total number of URL records
    pub total_urls: u64,

    /// Count of records per lifecycle state, in lifecycle order
    pub urls_by_state: Vec<(UrlState, u64)>,

    /// Committed documents in the full-text index
    pub indexed_documents: u64,
}

/// Loads statistics from the frontier
///
/// # Arguments
///
/// * `frontier` - The frontier backend to query
/// * `indexed_documents` - Document count reported by the index
pub fn load_statistics(
    frontier: &dyn FrontierStore,
    indexed_documents: u64,
) -> Result<FrontierStatistics, NewtError> {
    let mut urls_by_state = Vec::new();
    for state in UrlState::all_states() {
        urls_by_state.push((state, frontier.count_by_state(state)?));
    }
    let total_urls = urls_by_state.iter().map(|(_, count)| count).sum();

    Ok(FrontierStatistics {
        total_urls,
        urls_by_state,
        indexed_documents,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &FrontierStatistics) {
    println!("=== Frontier Statistics ===\n");

    println!("Overview:");
    println!("  Total URLs: {}", stats.total_urls);
    println!("  Indexed documents: {}", stats.indexed_documents);
    println!();

    println!("URLs by State:");
    for (state, count) in &stats.urls_by_state {
        println!(
            "  {}: {} ({:.1}%)",
            state,
            count,
            percentage(*count, stats.total_urls)
        );
    }
    println!();

    let crawled = stats
        .urls_by_state
        .iter()
        .find(|(state, _)| *state == UrlState::Crawled)
        .map_or(0, |(_, count)| *count);
    println!(
        "Crawled: {:.1}% ({} / {} known URLs)",
        percentage(crawled, stats.total_urls),
        crawled,
        stats.total_urls
    );
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
