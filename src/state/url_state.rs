//! Lifecycle states of a frontier URL record

use std::fmt;

/// Represents where a URL is in the crawl lifecycle
///
/// `Pending → Processing` only through an atomic claim; `Processing` then moves to
/// `Crawled` (terminal) or back to `Pending` (retry). Dropped URLs are deleted and have
/// no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    /// Discovered and waiting to be claimed
    Pending,

    /// Claimed by a worker that is fetching it
    Processing,

    /// Fetched and handed to the index
    Crawled,
}

impl UrlState {
    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Crawled => "crawled",
        }
    }

    /// Parses a state from its database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "crawled" => Some(Self::Crawled),
            _ => None,
        }
    }

    /// Returns all states in lifecycle order
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::Processing, Self::Crawled]
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
