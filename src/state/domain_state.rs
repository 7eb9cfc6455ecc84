use std::time::{Duration, Instant};

/// Recent fetch history for one domain
///
/// Held in memory by the politeness filter only. Losing it on restart just means the
/// first fetch per domain is not delayed.
#[derive(Debug, Clone, Default)]
pub struct DomainFetchState {
    /// Timestamp of the last fetch attempt to this domain
    pub last_fetch: Option<Instant>,
}

impl DomainFetchState {
    /// Creates an empty state (domain never fetched)
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the domain may be fetched again
    ///
    /// Returns None if a fetch can be made now, or the duration to wait otherwise.
    /// `last_fetch` may lie in the future when a fetch has been reserved but not issued.
    pub fn time_until_next_fetch(&self, min_interval: Duration, now: Instant) -> Option<Duration> {
        let next_allowed = self.last_fetch? + min_interval;
        if next_allowed > now {
            Some(next_allowed - now)
        } else {
            None
        }
    }

    /// Records a fetch attempt
    pub fn record_fetch(&mut self, now: Instant) {
        self.last_fetch = Some(now);
    }
}
