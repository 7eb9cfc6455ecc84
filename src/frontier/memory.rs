//! In-process frontier implementation
//!
//! All state lives behind one mutex, which makes every operation trivially atomic.
//! Nothing survives a restart.

use crate::frontier::traits::{
    ClaimedUrl, FrontierError, FrontierResult, FrontierStore, RefreshOutcome, RequeueOutcome,
};
use crate::frontier::{duration_millis, frontier_key, now_millis, FrontierPolicy};
use crate::state::UrlState;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use url::Url;

#[derive(Debug, Clone)]
struct Record {
    seq: u64,
    domain: String,
    state: UrlState,
    retry_count: u32,
    available_at: i64,
    lease_expires_at: i64,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, Record>,
    /// Claim order of every record that is not crawled
    queue: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Inner {
    fn enqueue(&mut self, url: String) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert(seq, url);
        seq
    }
}

/// In-memory frontier backend
pub struct MemoryFrontier {
    inner: Mutex<Inner>,
    policy: FrontierPolicy,
}

impl MemoryFrontier {
    pub fn new(policy: FrontierPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            policy,
        }
    }

    fn inner(&self) -> FrontierResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| FrontierError::LockPoisoned)
    }
}

impl Default for MemoryFrontier {
    fn default() -> Self {
        Self::new(FrontierPolicy::default())
    }
}

impl FrontierStore for MemoryFrontier {
    fn insert_if_absent(&self, url: &Url) -> FrontierResult<bool> {
        let (key, domain) = frontier_key(url)?;
        let mut inner = self.inner()?;
        if inner.records.contains_key(&key) {
            return Ok(false);
        }

        let seq = inner.enqueue(key.clone());
        inner.records.insert(
            key,
            Record {
                seq,
                domain,
                state: UrlState::Pending,
                retry_count: 0,
                available_at: 0,
                lease_expires_at: 0,
            },
        );
        Ok(true)
    }

    fn claim_one(&self) -> FrontierResult<Option<ClaimedUrl>> {
        let now = now_millis();
        let lease = duration_millis(self.policy.lease);
        let mut inner = self.inner()?;
        let Inner { records, queue, .. } = &mut *inner;

        let pending = queue.values().find(|url| {
            records
                .get(*url)
                .map_or(false, |r| r.state == UrlState::Pending && r.available_at <= now)
        });
        let chosen = pending.or_else(|| {
            queue.values().find(|url| {
                records
                    .get(*url)
                    .map_or(false, |r| r.state == UrlState::Processing && r.lease_expires_at < now)
            })
        });

        let Some(url) = chosen else {
            return Ok(None);
        };
        let Some(record) = records.get_mut(url) else {
            return Ok(None);
        };
        record.state = UrlState::Processing;
        record.lease_expires_at = now.saturating_add(lease);
        Ok(Some(ClaimedUrl {
            url: url.clone(),
            domain: record.domain.clone(),
            retry_count: record.retry_count,
        }))
    }

    fn complete(&self, url: &str) -> FrontierResult<()> {
        let mut inner = self.inner()?;
        let seq = match inner.records.get_mut(url) {
            Some(record) if record.state == UrlState::Processing => {
                record.state = UrlState::Crawled;
                record.seq
            }
            _ => return Ok(()),
        };
        inner.queue.remove(&seq);
        Ok(())
    }

    fn requeue(&self, url: &str) -> FrontierResult<RequeueOutcome> {
        let mut inner = self.inner()?;
        let record = match inner.records.get_mut(url) {
            Some(record) if record.state == UrlState::Processing => record,
            _ => return Ok(RequeueOutcome::Missing),
        };

        if record.retry_count >= self.policy.max_retries {
            let seq = record.seq;
            inner.records.remove(url);
            inner.queue.remove(&seq);
            return Ok(RequeueOutcome::Exhausted);
        }

        let attempt = record.retry_count + 1;
        record.retry_count = attempt;
        record.state = UrlState::Pending;
        record.available_at =
            now_millis().saturating_add(duration_millis(self.policy.backoff_for(attempt)));
        Ok(RequeueOutcome::Requeued { attempt })
    }

    fn release(&self, url: &str) -> FrontierResult<()> {
        let mut inner = self.inner()?;
        if let Some(record) = inner.records.get_mut(url) {
            if record.state == UrlState::Processing {
                record.state = UrlState::Pending;
            }
        }
        Ok(())
    }

    fn drop_url(&self, url: &str) -> FrontierResult<bool> {
        let mut inner = self.inner()?;
        match inner.records.remove(url) {
            Some(record) => {
                inner.queue.remove(&record.seq);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn refresh(&self, url: &Url) -> FrontierResult<RefreshOutcome> {
        if self.insert_if_absent(url)? {
            return Ok(RefreshOutcome::Inserted);
        }

        let (key, _) = frontier_key(url)?;
        let mut inner = self.inner()?;
        match inner.records.get(&key).map(|r| r.state) {
            Some(UrlState::Crawled) => {}
            _ => return Ok(RefreshOutcome::Unchanged),
        }

        let seq = inner.enqueue(key.clone());
        if let Some(record) = inner.records.get_mut(&key) {
            record.seq = seq;
            record.state = UrlState::Pending;
            record.retry_count = 0;
            record.available_at = 0;
        }
        Ok(RefreshOutcome::Revived)
    }

    fn recover_in_flight(&self) -> FrontierResult<u64> {
        let mut inner = self.inner()?;
        let mut recovered = 0;
        for record in inner.records.values_mut() {
            if record.state == UrlState::Processing {
                record.state = UrlState::Pending;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    fn status(&self, url: &str) -> FrontierResult<Option<UrlState>> {
        Ok(self.inner()?.records.get(url).map(|r| r.state))
    }

    fn count_by_state(&self, state: UrlState) -> FrontierResult<u64> {
        Ok(self
            .inner()?
            .records
            .values()
            .filter(|r| r.state == state)
            .count() as u64)
    }

    fn clear(&self) -> FrontierResult<()> {
        let mut inner = self.inner()?;
        inner.records.clear();
        inner.queue.clear();
        Ok(())
    }
}
