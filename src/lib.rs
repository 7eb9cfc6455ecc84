//! Newt: a continuous breadth-first web crawler feeding a full-text index
//!
//! This crate implements a crawl engine that claims URLs from a persistent frontier,
//! fetches and extracts page text with many concurrent workers, and feeds a tantivy
//! index through a batched writer with periodic commits.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod index;
pub mod state;
pub mod stats;
pub mod url;

use thiserror::Error;

/// Main error type for Newt operations
#[derive(Debug, Error)]
pub enum NewtError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] frontier::FrontierError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Newt operations
pub type Result<T> = std::result::Result<T, NewtError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, ExtractedPage};
pub use frontier::{FrontierStore, MemoryFrontier, SqliteFrontier};
pub use index::{Document, IndexSink, TantivyIndex};
pub use state::{DomainFetchState, UrlState};
pub use url::{canonicalize_url, extract_domain};
