//! Politeness and domain-diversity policy
//!
//! Rules, applied in order:
//! 1. Deny URLs whose host matches a blocked-domain pattern
//! 2. Deny URLs whose path ends in a blocked (binary/media) extension
//! 3. URLs already crawled or in flight are never re-inserted; the frontier's
//!    insert-if-absent enforces this, so it is not re-derived here
//! 4. Otherwise allow after a random jitter, extended so the same domain is not hit more
//!    often than the configured minimum interval
//!
//! Discovered links additionally pass the optional diversity filter, which keeps only
//! links to a different host than the page they were found on.

use crate::config::Config;
use crate::state::DomainFetchState;
use crate::url::{extract_domain, is_blocked_domain, path_extension, same_host};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

/// Tracked domains are pruned once the map grows past this size
const TRACKER_PRUNE_THRESHOLD: usize = 10_000;

/// Why a URL was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    BlockedDomain,
    BlockedExtension,
    MissingHost,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::BlockedDomain => "blocked domain",
            Self::BlockedExtension => "blocked extension",
            Self::MissingHost => "missing host",
        };
        f.write_str(reason)
    }
}

/// Outcome of a politeness check for a URL about to be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Fetch after waiting `delay`
    Allow { delay: Duration },
    Deny(DenyReason),
}

/// Static politeness configuration
#[derive(Debug, Clone)]
pub struct PolitenessFilter {
    blocked_domains: Vec<String>,
    blocked_extensions: HashSet<String>,
    delay_min: Duration,
    delay_max: Duration,
    min_domain_interval: Duration,
    diverse_links: bool,
}

impl PolitenessFilter {
    pub fn new(config: &Config) -> Self {
        Self {
            blocked_domains: config
                .blocked_domains
                .iter()
                .map(|d| d.to_ascii_lowercase())
                .collect(),
            blocked_extensions: config
                .blocked_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            delay_min: Duration::from_millis(config.crawler.politeness_delay_min_ms),
            delay_max: Duration::from_millis(config.crawler.politeness_delay_max_ms),
            min_domain_interval: config.crawler.min_domain_interval(),
            diverse_links: config.crawler.diverse_links,
        }
    }

    /// Checks the static rules (blocked domain, blocked extension)
    pub fn check_url(&self, url: &Url) -> Result<(), DenyReason> {
        let domain = extract_domain(url).ok_or(DenyReason::MissingHost)?;
        if is_blocked_domain(&domain, &self.blocked_domains) {
            return Err(DenyReason::BlockedDomain);
        }
        if let Some(ext) = path_extension(url) {
            if self.blocked_extensions.contains(&ext) {
                return Err(DenyReason::BlockedExtension);
            }
        }
        Ok(())
    }

    /// Decides whether and when a claimed URL may be fetched
    ///
    /// Pure apart from the supplied random source: the same inputs and RNG state give
    /// the same decision.
    pub fn decide<R: Rng>(
        &self,
        url: &Url,
        domain_state: Option<&DomainFetchState>,
        now: Instant,
        rng: &mut R,
    ) -> Decision {
        if let Err(reason) = self.check_url(url) {
            return Decision::Deny(reason);
        }

        let jitter = self.jitter(rng);
        let domain_wait = domain_state
            .and_then(|state| state.time_until_next_fetch(self.min_domain_interval, now))
            .unwrap_or_default();

        Decision::Allow {
            delay: jitter.max(domain_wait),
        }
    }

    fn jitter<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.delay_max <= self.delay_min {
            return self.delay_min;
        }
        let min = self.delay_min.as_millis() as u64;
        let max = self.delay_max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min..=max))
    }

    /// Filters the links discovered on `page_url` down to those worth enqueueing
    pub fn select_links(&self, page_url: &Url, links: Vec<Url>) -> Vec<Url> {
        links
            .into_iter()
            .filter(|link| self.check_url(link).is_ok())
            .filter(|link| !self.diverse_links || !same_host(page_url, link))
            .collect()
    }
}

/// Shared per-domain fetch history
///
/// `admit` runs the politeness decision and reserves the fetch slot under one lock, so
/// two workers holding URLs of the same domain are spaced apart.
#[derive(Debug, Default)]
pub struct DomainTracker {
    states: Mutex<HashMap<String, DomainFetchState>>,
}

impl DomainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides on `url` and, if allowed, records the fetch at the end of its delay
    pub fn admit<R: Rng>(
        &self,
        filter: &PolitenessFilter,
        url: &Url,
        domain: &str,
        rng: &mut R,
    ) -> Decision {
        let now = Instant::now();
        let mut states = match self.states.lock() {
            Ok(states) => states,
            // Fetch history is advisory; a poisoned map is simply reused
            Err(poisoned) => poisoned.into_inner(),
        };

        if states.len() > TRACKER_PRUNE_THRESHOLD {
            let interval = filter.min_domain_interval;
            states.retain(|_, state| state.time_until_next_fetch(interval, now).is_some());
        }

        let decision = filter.decide(url, states.get(domain), now, rng);
        if let Decision::Allow { delay } = decision {
            states
                .entry(domain.to_string())
                .or_default()
                .record_fetch(now + delay);
        }
        decision
    }

    /// Number of domains currently tracked, reported with crawl progress
    pub(crate) fn len(&self) -> usize {
        self.states.lock().map(|s| s.len()).unwrap_or(0)
    }
}
