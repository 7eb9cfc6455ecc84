//! Frontier store trait and error types
//!
//! This module defines the claim/complete/requeue protocol shared by all frontier
//! backends and the associated error types.

use crate::state::UrlState;
use thiserror::Error;
use url::Url;

/// Errors that can occur during frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("URL cannot be stored in the frontier: {0}")]
    InvalidUrl(String),

    #[error("Unknown URL state in store: {0}")]
    CorruptState(String),

    #[error("Frontier lock poisoned")]
    LockPoisoned,
}

/// Result type for frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;

/// A URL handed to exactly one worker by `claim_one`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedUrl {
    /// Canonical URL, also the key for `complete`/`requeue`/`release`
    pub url: String,

    /// Lowercase host of the URL
    pub domain: String,

    /// Transient failures recorded for this URL so far
    pub retry_count: u32,
}

/// What `requeue` did with a URL after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    /// Back to pending; claimable again after a backoff
    Requeued { attempt: u32 },

    /// Retry budget spent; the record was deleted
    Exhausted,

    /// No record with that URL is being processed
    Missing,
}

/// What `refresh` did with a seed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The URL was unknown and is now pending
    Inserted,

    /// The URL was crawled and is pending again
    Revived,

    /// The URL was already pending or in flight
    Unchanged,
}

/// Durable work queue of discovered URLs
///
/// All operations take `&self` so a single store can be shared across workers behind an
/// `Arc`. Implementations must make `claim_one` a single atomic test-and-set: two
/// concurrent callers can never receive the same URL.
pub trait FrontierStore: Send + Sync {
    /// Inserts the URL as pending if no record exists for its canonical form
    ///
    /// Returns true if a record was created.
    fn insert_if_absent(&self, url: &Url) -> FrontierResult<bool>;

    /// Atomically claims one claimable record and marks it processing
    ///
    /// Claimable means pending with an elapsed backoff, or processing with an expired
    /// lease. Pending records are preferred. Returns None when nothing is claimable.
    fn claim_one(&self) -> FrontierResult<Option<ClaimedUrl>>;

    /// Marks a processing URL crawled (terminal)
    ///
    /// Records in any other state are left alone, so a worker whose lease was taken
    /// over cannot overwrite the new claimant's outcome.
    fn complete(&self, url: &str) -> FrontierResult<()>;

    /// Returns a processing URL to pending after a transient failure, or drops it once
    /// its retry budget is spent
    ///
    /// Records that are not processing are left alone and report `Missing`.
    fn requeue(&self, url: &str) -> FrontierResult<RequeueOutcome>;

    /// Returns an in-flight URL to pending without counting a retry
    fn release(&self, url: &str) -> FrontierResult<()>;

    /// Deletes the record (permanent failure). Returns true if one existed.
    fn drop_url(&self, url: &str) -> FrontierResult<bool>;

    /// Makes a seed URL pending: inserts it if unknown, revives it if crawled, and
    /// leaves pending or in-flight records alone
    fn refresh(&self, url: &Url) -> FrontierResult<RefreshOutcome>;

    /// Returns every processing record to pending (startup crash recovery)
    ///
    /// Returns the number of records recovered.
    fn recover_in_flight(&self) -> FrontierResult<u64>;

    /// Gets the state of a URL, if it is known
    fn status(&self, url: &str) -> FrontierResult<Option<UrlState>>;

    /// Counts records in the given state
    fn count_by_state(&self, state: UrlState) -> FrontierResult<u64>;

    /// Deletes every record
    fn clear(&self) -> FrontierResult<()>;
}
