//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers (or a canned fetcher for
//! unroutable hosts) and drive the full claim-fetch-extract-index cycle.

use async_trait::async_trait;
use newt::config::Config;
use newt::crawler::{CycleOutcome, FetchOutcome, HttpFetcher, PageFetcher};
use newt::frontier::{FrontierPolicy, FrontierStore, MemoryFrontier, SqliteFrontier};
use newt::index::{Document, IndexSink, TantivyIndex};
use newt::{canonicalize_url, CrawlEngine, UrlState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves fixed HTML bodies for hosts that do not resolve
struct CannedFetcher {
    pages: HashMap<String, &'static str>,
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, url: &Url) -> FetchOutcome {
        match self.pages.get(url.as_str()) {
            Some(body) => FetchOutcome::Success {
                final_url: url.clone(),
                status: 200,
                body: body.as_bytes().to_vec(),
            },
            None => FetchOutcome::HttpError { status: 404 },
        }
    }
}

/// Creates a test configuration with no politeness delays
fn create_test_config(seeds: Vec<String>) -> Config {
    let mut config = Config::default();
    config.seeds = seeds;
    config.crawler.workers = 2;
    config.crawler.idle_backoff_ms = 20;
    config.crawler.politeness_delay_min_ms = 0;
    config.crawler.politeness_delay_max_ms = 0;
    config.crawler.min_domain_interval_ms = 0;
    config.http.timeout_secs = 1;
    config.index.commit_interval_secs = 1;
    config
}

struct Stores {
    _dir: TempDir,
    frontier: Arc<SqliteFrontier>,
    index: Arc<TantivyIndex>,
}

fn open_stores(config: &Config) -> Stores {
    let dir = TempDir::new().unwrap();
    let frontier = SqliteFrontier::open(
        &dir.path().join("frontier.db"),
        FrontierPolicy::from_config(&config.crawler),
    )
    .unwrap();
    let index = TantivyIndex::open_or_create(&dir.path().join("index"), 15_000_000, 1_000).unwrap();
    Stores {
        _dir: dir,
        frontier: Arc::new(frontier),
        index: Arc::new(index),
    }
}

fn http_engine(config: &Config, stores: &Stores) -> CrawlEngine {
    CrawlEngine::from_parts(
        config.clone(),
        stores.frontier.clone(),
        stores.index.clone(),
        Arc::new(HttpFetcher::new(&config.http).unwrap()),
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

#[tokio::test]
async fn test_end_to_end_single_cycle() {
    let config = create_test_config(vec!["https://example.test/a".to_string()]);
    let stores = open_stores(&config);
    let fetcher = CannedFetcher {
        pages: HashMap::from([(
            "https://example.test/a".to_string(),
            r#"<html><head><title>A</title></head>
               <body><p>hello world</p><a href="https://example.test/b"></a></body></html>"#,
        )]),
    };
    let engine = CrawlEngine::from_parts(
        config,
        stores.frontier.clone(),
        stores.index.clone(),
        Arc::new(fetcher),
    );

    let seeded = engine.reseeder().reseed_once().await.unwrap();
    assert_eq!(seeded.inserted, 1);

    let outcome = engine
        .worker(0)
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CycleOutcome::Crawled {
            url: "https://example.test/a".to_string(),
            links_added: 1
        }
    );
    stores.index.commit().unwrap();

    let hits = stores.index.search("hello", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "https://example.test/a");
    assert_eq!(hits[0].title, "A");
    assert_eq!(hits[0].snippet, "hello world");

    assert_eq!(
        stores.frontier.status("https://example.test/a").unwrap(),
        Some(UrlState::Crawled)
    );
    assert_eq!(
        stores.frontier.status("https://example.test/b").unwrap(),
        Some(UrlState::Pending)
    );
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><title>Home</title></head><body>
               <p>Welcome home</p>
               <a href="/page1">Page 1</a>
               <a href="/page2">Page 2</a>
               </body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;
    for page in ["page1", "page2"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}", page)))
            .respond_with(html(format!(
                "<html><head><title>{page}</title></head><body>Content of {page}</body></html>"
            )))
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(vec![format!("{}/", base_url)]);
    let stores = open_stores(&config);
    let engine = http_engine(&config, &stores);

    let shutdown = CancellationToken::new();
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        stopper.cancel();
    });
    let snapshot = engine.run(shutdown).await.unwrap();

    assert_eq!(snapshot.crawled, 3);
    assert_eq!(snapshot.discovered, 2);
    assert_eq!(
        stores.frontier.count_by_state(UrlState::Crawled).unwrap(),
        3
    );
    assert_eq!(stores.index.doc_count(), 3);
    assert_eq!(stores.index.search("page2", 10).unwrap().len(), 1);
}

#[tokio::test]
async fn test_http_404_is_dropped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let missing = format!("{}/missing", mock_server.uri());
    let config = create_test_config(vec![missing.clone()]);
    let stores = open_stores(&config);
    let engine = http_engine(&config, &stores);
    engine.reseeder().reseed_once().await.unwrap();

    let outcome = engine
        .worker(0)
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, CycleOutcome::Dropped { .. }));
    assert_eq!(stores.frontier.status(&missing).unwrap(), None);
    assert_eq!(stores.index.pending_len(), 0);
}

#[tokio::test]
async fn test_timeout_is_requeued() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>too late</p>".to_string()).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let slow = format!("{}/slow", mock_server.uri());
    let config = create_test_config(vec![slow.clone()]);
    let stores = open_stores(&config);
    let engine = http_engine(&config, &stores);
    engine.reseeder().reseed_once().await.unwrap();

    let outcome = engine
        .worker(0)
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, CycleOutcome::Requeued { .. }));
    assert_eq!(
        stores.frontier.status(&slow).unwrap(),
        Some(UrlState::Pending)
    );
    assert_eq!(engine.counters().snapshot().requeued, 1);
}

#[tokio::test]
async fn test_blocked_links_never_inserted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<body><p>share this</p>
               <a href="https://facebook.com/share"></a>
               <a href="https://www.instagram.com/p/1"></a>
               <a href="/report.pdf"></a>
               <a href="/next"></a></body>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    let root = format!("{}/", mock_server.uri());
    let config = create_test_config(vec![root]);
    let stores = open_stores(&config);
    let engine = http_engine(&config, &stores);
    engine.reseeder().reseed_once().await.unwrap();

    let outcome = engine
        .worker(0)
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, CycleOutcome::Crawled { links_added: 1, .. }));

    let pdf = format!("{}/report.pdf", mock_server.uri());
    for blocked in [
        "https://facebook.com/share",
        "https://www.instagram.com/p/1",
        pdf.as_str(),
    ] {
        assert_eq!(stores.frontier.status(blocked).unwrap(), None, "{}", blocked);
    }
    assert_eq!(
        stores
            .frontier
            .status(&format!("{}/next", mock_server.uri()))
            .unwrap(),
        Some(UrlState::Pending)
    );
}

#[tokio::test]
async fn test_links_below_cap_create_no_duplicates() {
    let mut body = String::from("<body><p>hub</p>");
    for i in 0..5 {
        body.push_str(&format!(r#"<a href="/p{i}"></a><a href="/p{i}#again"></a>"#));
    }
    body.push_str(r#"<a href="/"></a></body>"#);

    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(body))
        .mount(&mock_server)
        .await;

    let config = create_test_config(vec![format!("{}/", mock_server.uri())]);
    let stores = open_stores(&config);
    let engine = http_engine(&config, &stores);
    engine.reseeder().reseed_once().await.unwrap();

    let outcome = engine
        .worker(0)
        .run_once(&CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, CycleOutcome::Crawled { links_added: 5, .. }));
    assert_eq!(
        stores.frontier.count_by_state(UrlState::Pending).unwrap(),
        5
    );
    assert_eq!(
        stores.frontier.count_by_state(UrlState::Crawled).unwrap(),
        1
    );
}

#[tokio::test]
async fn test_reseed_interval_restores_all_seeds() {
    let seeds = vec![
        "https://hub-one.test/".to_string(),
        "https://hub-two.test/".to_string(),
    ];
    let mut config = create_test_config(seeds.clone());
    config.reseed.interval_secs = 1;

    let frontier = Arc::new(MemoryFrontier::default());
    frontier
        .insert_if_absent(&canonicalize_url(&seeds[0]).unwrap())
        .unwrap();
    let claimed = frontier.claim_one().unwrap().unwrap();
    frontier.complete(&claimed.url).unwrap();

    let engine = CrawlEngine::from_parts(
        config,
        frontier.clone(),
        Arc::new(TantivyIndex::in_memory(10).unwrap()),
        Arc::new(CannedFetcher {
            pages: HashMap::new(),
        }),
    );

    let shutdown = CancellationToken::new();
    let reseeder = tokio::spawn(engine.reseeder().run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    shutdown.cancel();
    reseeder.await.unwrap();

    for seed in &seeds {
        assert_eq!(
            frontier.status(seed).unwrap(),
            Some(UrlState::Pending),
            "{}",
            seed
        );
    }
}

#[tokio::test]
async fn test_fragment_variants_share_one_record() {
    let frontier = MemoryFrontier::default();
    assert!(frontier
        .insert_if_absent(&canonicalize_url("https://x.com/a#b").unwrap())
        .unwrap());
    assert!(!frontier
        .insert_if_absent(&canonicalize_url("https://x.com/a#c").unwrap())
        .unwrap());
    assert_eq!(frontier.count_by_state(UrlState::Pending).unwrap(), 1);
    assert_eq!(
        frontier.status("https://x.com/a").unwrap(),
        Some(UrlState::Pending)
    );
}

#[tokio::test]
async fn test_latest_upsert_wins_after_commit() {
    let index = TantivyIndex::in_memory(10).unwrap();
    for content in ["first draft", "final version"] {
        index
            .upsert(Document {
                url: "https://example.test/doc".to_string(),
                title: "Doc".to_string(),
                content: content.to_string(),
            })
            .unwrap();
    }
    index.commit().unwrap();

    assert_eq!(index.doc_count(), 1);
    assert!(index.search("draft", 10).unwrap().is_empty());
    let hits = index.search("final", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].snippet, "final version");
}
