//! Frontier module: the persistent work queue shared by all fetch workers
//!
//! Two backends implement [`FrontierStore`]:
//! - [`SqliteFrontier`]: durable, used by the crawler
//! - [`MemoryFrontier`]: in-process, for tests and throwaway runs
//!
//! Both enforce the same lifecycle (`pending → processing → crawled`, with requeue and
//! drop on failure) and key records by canonical URL, so dedup is structural.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryFrontier;
pub use sqlite::SqliteFrontier;
pub use traits::{
    ClaimedUrl, FrontierError, FrontierResult, FrontierStore, RefreshOutcome, RequeueOutcome,
};

use crate::config::CrawlerConfig;
use crate::url::{canonicalize_parsed, extract_domain};
use std::time::Duration;
use url::Url;

/// Retry backoff never grows past this
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(3600);

/// Lease and retry policy applied by frontier backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierPolicy {
    /// How long a claim stays exclusive before another worker may take it over
    pub lease: Duration,

    /// Transient failures tolerated before a URL is dropped
    pub max_retries: u32,

    /// Delay before the first retry; doubles with every further attempt
    pub retry_backoff: Duration,
}

impl FrontierPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            lease: config.lease(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }

    /// Delay before attempt number `attempt` (1-based) becomes claimable
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.retry_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(MAX_RETRY_BACKOFF)
            .min(MAX_RETRY_BACKOFF)
    }
}

impl Default for FrontierPolicy {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Canonical key and domain for a URL entering the frontier
pub(crate) fn frontier_key(url: &Url) -> FrontierResult<(String, String)> {
    let canonical = canonicalize_parsed(url.clone())
        .map_err(|e| FrontierError::InvalidUrl(format!("{}: {}", url, e)))?;
    let domain = extract_domain(&canonical)
        .ok_or_else(|| FrontierError::InvalidUrl(format!("{}: missing host", url)))?;
    Ok((canonical.into(), domain))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = FrontierPolicy {
            lease: Duration::from_secs(60),
            max_retries: 10,
            retry_backoff: Duration::from_secs(30),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_secs(30));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(60));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(120));
        assert_eq!(policy.backoff_for(20), MAX_RETRY_BACKOFF);
        assert_eq!(policy.backoff_for(u32::MAX), MAX_RETRY_BACKOFF);
    }

    #[test]
    fn test_frontier_key_strips_fragment() {
        let (key, domain) = frontier_key(&Url::parse("https://X.com/a?q=1#frag").unwrap()).unwrap();
        assert_eq!(key, "https://x.com/a?q=1");
        assert_eq!(domain, "x.com");
    }
}
