//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client from the `[http]` configuration
//! - Rotating the User-Agent header per request
//! - Admission control over outbound connections
//! - Capped body reads
//! - Error classification into permanent and transient failures

use crate::config::HttpConfig;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect::Policy, Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Redirect hops followed before a fetch is abandoned
const MAX_REDIRECTS: usize = 10;

/// Content types the extractor can index
const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// Successfully fetched an HTML page
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status: u16,
        /// Body bytes, at most `max-body-bytes` of them
        body: Vec<u8>,
    },

    /// Server answered with a non-2xx status
    HttpError { status: u16 },

    /// Page is not HTML (Content-Type mismatch)
    NotHtml { content_type: String },

    /// Network error (connection refused, DNS, timeout, body read)
    Transient { error: String },
}

impl FetchOutcome {
    /// Whether the URL should be dropped rather than retried
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::HttpError { .. } | Self::NotHtml { .. })
    }
}

/// Source of fetched pages
///
/// Production uses [`HttpFetcher`]; tests substitute canned responses.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> FetchOutcome;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use newt::config::HttpConfig;
/// use newt::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.timeout().min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .pool_max_idle_per_host(8)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
    user_agents: Vec<String>,
    connections: Arc<Semaphore>,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            user_agents: config.user_agents.clone(),
            connections: Arc::new(Semaphore::new(config.max_connections.max(1) as usize)),
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn pick_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.user_agents.len());
        Some(self.user_agents[index].as_str())
    }

    /// Reads the body chunk by chunk, keeping at most `max_body_bytes`
    async fn read_capped(&self, mut response: Response) -> Result<Vec<u8>, reqwest::Error> {
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                tracing::debug!("Body truncated at {} bytes", self.max_body_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchOutcome {
        let _permit = match self.connections.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return FetchOutcome::Transient {
                    error: e.to_string(),
                }
            }
        };

        let mut request = self.client.get(url.clone());
        if let Some(agent) = self.pick_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Transient { error: classify(&e) },
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::HttpError {
                status: status.as_u16(),
            };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);
        if let Some(content_type) = content_type {
            if !is_html(&content_type) {
                return FetchOutcome::NotHtml { content_type };
            }
        }

        let final_url = response.url().clone();
        match self.read_capped(response).await {
            Ok(body) => FetchOutcome::Success {
                final_url,
                status: status.as_u16(),
                body,
            },
            Err(e) => FetchOutcome::Transient { error: classify(&e) },
        }
    }
}

/// Missing or empty content types are given the benefit of the doubt
fn is_html(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime.is_empty() || HTML_CONTENT_TYPES.contains(&mime)
}

fn classify(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        format!("redirect error: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> HttpConfig {
        HttpConfig {
            timeout_secs: 2,
            user_agents: vec!["TestBot/1.0".to_string()],
            ..HttpConfig::default()
        }
    }

    fn fetcher(config: &HttpConfig) -> HttpFetcher {
        HttpFetcher::new(config).unwrap()
    }

    fn page_url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&HttpConfig::default()).is_ok());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("application/xhtml+xml"));
        assert!(is_html(""));
        assert!(!is_html("application/pdf"));
        assert!(!is_html("image/png"));
    }

    #[tokio::test]
    async fn test_fetch_success_with_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("user-agent", "TestBot/1.0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>hi</html>", "text/html"),
            )
            .mount(&server)
            .await;

        let url = page_url(&server, "/page");
        match fetcher(&test_config()).fetch(&url).await {
            FetchOutcome::Success {
                final_url,
                status,
                body,
            } => {
                assert_eq!(final_url, url);
                assert_eq!(status, 200);
                assert_eq!(body, b"<html>hi</html>");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_404_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = fetcher(&test_config())
            .fetch(&page_url(&server, "/missing"))
            .await;
        assert!(matches!(outcome, FetchOutcome::HttpError { status: 404 }));
        assert!(outcome.is_permanent());
    }

    #[tokio::test]
    async fn test_fetch_non_html_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
            .mount(&server)
            .await;

        let outcome = fetcher(&test_config()).fetch(&page_url(&server, "/data")).await;
        match outcome {
            FetchOutcome::NotHtml { content_type } => assert_eq!(content_type, "application/json"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>late</html>", "text/html")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = HttpConfig {
            timeout_secs: 1,
            ..test_config()
        };
        let outcome = fetcher(&config).fetch(&page_url(&server, "/slow")).await;
        assert!(matches!(outcome, FetchOutcome::Transient { .. }));
        assert!(!outcome.is_permanent());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transient() {
        // Nothing listens on the discard port
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let outcome = fetcher(&test_config()).fetch(&url).await;
        assert!(matches!(outcome, FetchOutcome::Transient { .. }));
    }

    #[tokio::test]
    async fn test_body_is_capped() {
        let server = MockServer::start().await;
        let big = "x".repeat(10_000);
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(big, "text/html"))
            .mount(&server)
            .await;

        let config = HttpConfig {
            max_body_bytes: 2_048,
            ..test_config()
        };
        match fetcher(&config).fetch(&page_url(&server, "/big")).await {
            FetchOutcome::Success { body, .. } => assert_eq!(body.len(), 2_048),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_redirect_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<p>moved</p>", "text/html"))
            .mount(&server)
            .await;

        match fetcher(&test_config()).fetch(&page_url(&server, "/old")).await {
            FetchOutcome::Success { final_url, .. } => {
                assert_eq!(final_url, page_url(&server, "/new"))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
