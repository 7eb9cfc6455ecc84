use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Newt
///
/// Every section has defaults matching the crawler's built-in constants, so an empty
/// TOML file is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed URLs inserted at startup and re-injected by the reseeder
    pub seeds: Vec<String>,

    /// Domain patterns never crawled (e.g., "facebook.com" or "*.facebook.com")
    #[serde(rename = "blocked-domains")]
    pub blocked_domains: Vec<String>,

    /// Path extensions that are not text-indexable (without the leading dot)
    #[serde(rename = "blocked-extensions")]
    pub blocked_extensions: Vec<String>,

    pub crawler: CrawlerConfig,
    pub http: HttpConfig,
    pub index: IndexConfig,
    pub frontier: FrontierConfig,
    pub reseed: ReseedConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent fetch workers
    pub workers: u32,

    /// Maximum number of outbound links kept from a single page
    #[serde(rename = "max-links-per-page")]
    pub max_links_per_page: usize,

    /// Maximum number of characters of page text sent to the index
    #[serde(rename = "max-content-chars")]
    pub max_content_chars: usize,

    /// Keep only links pointing at a different host than the current page
    #[serde(rename = "diverse-links")]
    pub diverse_links: bool,

    /// Sleep between claim attempts when the frontier has nothing claimable (milliseconds)
    #[serde(rename = "idle-backoff-ms")]
    pub idle_backoff_ms: u64,

    /// Lower bound of the random pause before each fetch (milliseconds)
    #[serde(rename = "politeness-delay-min-ms")]
    pub politeness_delay_min_ms: u64,

    /// Upper bound of the random pause before each fetch (milliseconds)
    #[serde(rename = "politeness-delay-max-ms")]
    pub politeness_delay_max_ms: u64,

    /// Minimum time between two fetches to the same domain (milliseconds)
    #[serde(rename = "min-domain-interval-ms")]
    pub min_domain_interval_ms: u64,

    /// How long a claim is held before it may be reclaimed by another worker (seconds)
    #[serde(rename = "lease-secs")]
    pub lease_secs: u64,

    /// Transient failures tolerated before a URL is dropped
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay before a requeued URL becomes claimable again (milliseconds)
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Maximum number of requests in flight across all workers
    #[serde(rename = "max-connections")]
    pub max_connections: u32,

    /// Response bodies are truncated after this many bytes
    #[serde(rename = "max-body-bytes")]
    pub max_body_bytes: usize,

    /// Disable TLS certificate verification
    #[serde(rename = "accept-invalid-certs")]
    pub accept_invalid_certs: bool,

    /// Pool of User-Agent strings; one is picked at random for each request
    #[serde(rename = "user-agents")]
    pub user_agents: Vec<String>,
}

/// When buffered documents are committed to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitMode {
    /// A background loop commits every `commit-interval-secs`
    Periodic,
    /// Each worker commits right after writing its document
    PerDocument,
}

/// Full-text index configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the tantivy index
    pub path: String,

    #[serde(rename = "commit-mode")]
    pub commit_mode: CommitMode,

    /// Interval of the periodic commit loop (seconds)
    #[serde(rename = "commit-interval-secs")]
    pub commit_interval_secs: u64,

    /// Memory budget of each index writer generation (bytes)
    #[serde(rename = "writer-heap-bytes")]
    pub writer_heap_bytes: usize,

    /// Documents buffered between commits before new upserts are refused
    #[serde(rename = "max-pending-documents")]
    pub max_pending_documents: usize,
}

/// Frontier store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    /// Path to the SQLite database file
    pub path: String,
}

/// Reseed loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReseedConfig {
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,
}

impl CrawlerConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn min_domain_interval(&self) -> Duration {
        Duration::from_millis(self.min_domain_interval_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IndexConfig {
    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs)
    }
}

impl ReseedConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

const DEFAULT_SEEDS: &[&str] = &[
    "https://wikipedia.org",
    "https://news.ycombinator.com",
    "https://github.com",
    "https://stackoverflow.com",
    "https://bbc.com",
    "https://nytimes.com",
    "https://reddit.com/r/all",
];

const DEFAULT_BLOCKED_DOMAINS: &[&str] = &[
    "instagram.com",
    "facebook.com",
    "tiktok.com",
    "linkedin.com",
    "twitter.com",
    "x.com",
    "youtube.com",
];

const DEFAULT_BLOCKED_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "svg", "webp", "zip", "gz", "tar", "rar", "7z",
    "mp3", "mp4", "avi", "mov", "exe", "dmg", "iso",
];

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeds: to_strings(DEFAULT_SEEDS),
            blocked_domains: to_strings(DEFAULT_BLOCKED_DOMAINS),
            blocked_extensions: to_strings(DEFAULT_BLOCKED_EXTENSIONS),
            crawler: CrawlerConfig::default(),
            http: HttpConfig::default(),
            index: IndexConfig::default(),
            frontier: FrontierConfig::default(),
            reseed: ReseedConfig::default(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 25,
            max_links_per_page: 40,
            max_content_chars: 15_000,
            diverse_links: false,
            idle_backoff_ms: 1_000,
            politeness_delay_min_ms: 1_000,
            politeness_delay_max_ms: 3_000,
            min_domain_interval_ms: 1_000,
            lease_secs: 300,
            max_retries: 5,
            retry_backoff_ms: 30_000,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_connections: 100,
            max_body_bytes: 5 * 1024 * 1024,
            accept_invalid_certs: false,
            user_agents: to_strings(DEFAULT_USER_AGENTS),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: "newt_index".to_string(),
            commit_mode: CommitMode::Periodic,
            commit_interval_secs: 5,
            writer_heap_bytes: 50_000_000,
            max_pending_documents: 10_000,
        }
    }
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            path: "frontier.db".to_string(),
        }
    }
}

impl Default for ReseedConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1_800,
        }
    }
}
