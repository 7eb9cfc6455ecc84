//! Index module: the full-text index fed by the crawler
//!
//! Workers hand finished pages to an [`IndexSink`] which buffers them; a commit makes
//! every buffered document visible and durable at once. [`TantivyIndex`] is the
//! production sink.

mod tantivy_index;

pub use tantivy_index::{SearchHit, TantivyIndex};

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Invalid query: {0}")]
    QueryParser(#[from] tantivy::query::QueryParserError),

    #[error("Index directory error: {0}")]
    Directory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pending document buffer is full ({limit} documents)")]
    BufferFull { limit: usize },

    #[error("Index lock poisoned")]
    LockPoisoned,
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// A page ready for indexing, keyed by its canonical URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Distinct documents written by this commit
    pub documents: usize,

    pub elapsed: Duration,
}

/// Write side of the full-text index
///
/// `upsert` only buffers and never touches the writer, so it is safe to call from many
/// workers at once. `commit` is blocking; async callers run it on the blocking pool.
pub trait IndexSink: Send + Sync {
    /// Buffers a document, replacing any earlier document with the same URL at the next
    /// commit
    fn upsert(&self, doc: Document) -> IndexResult<()>;

    /// Writes all buffered documents with a fresh writer and commits them
    ///
    /// On failure the documents stay buffered for the next attempt.
    fn commit(&self) -> IndexResult<CommitStats>;

    /// Number of documents buffered since the last successful commit
    fn pending_len(&self) -> usize;
}
