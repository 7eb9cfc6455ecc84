//! Newt main entry point
//!
//! This is the command-line interface for the Newt crawler.

use anyhow::{Context, Result};
use clap::Parser;
use newt::config::{load_config_with_hash, validate, Config};
use newt::frontier::{FrontierPolicy, SqliteFrontier};
use newt::stats::{load_statistics, print_statistics};
use newt::{CrawlEngine, TantivyIndex};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Newt: a continuous breadth-first web crawler
///
/// Newt crawls the web from a set of seed URLs, extracts page text and feeds a local
/// full-text index, running until interrupted.
#[derive(Parser, Debug)]
#[command(name = "newt")]
#[command(version)]
#[command(about = "A continuous web crawler feeding a full-text index", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Clear the frontier before starting
    #[arg(long)]
    fresh: bool,

    /// Validate config and print the effective settings without crawling
    #[arg(long, conflicts_with_all = ["stats", "search"])]
    dry_run: bool,

    /// Show frontier and index statistics and exit
    #[arg(long, conflicts_with_all = ["dry_run", "search"])]
    stats: bool,

    /// Query the local index and print the best matches
    #[arg(long, value_name = "QUERY", conflicts_with_all = ["dry_run", "stats"])]
    search: Option<String>,

    /// Maximum number of search results
    #[arg(long, default_value_t = 10, requires = "search")]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(query) = &cli.search {
        handle_search(&config, query, cli.limit)?;
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("newt=info,warn"),
            1 => EnvFilter::new("newt=debug,info"),
            2 => EnvFilter::new("newt=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads and validates the configuration, falling back to defaults without a file
fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let config = Config::default();
            validate(&config).context("built-in defaults failed validation")?;
            Ok(config)
        }
    }
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Newt Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Max links per page: {}", config.crawler.max_links_per_page);
    println!("  Max content chars: {}", config.crawler.max_content_chars);
    println!("  Diverse links: {}", config.crawler.diverse_links);
    println!(
        "  Politeness delay: {}-{}ms (min {}ms per domain)",
        config.crawler.politeness_delay_min_ms,
        config.crawler.politeness_delay_max_ms,
        config.crawler.min_domain_interval_ms
    );
    println!(
        "  Lease: {}s, max retries: {}, retry backoff: {}ms",
        config.crawler.lease_secs, config.crawler.max_retries, config.crawler.retry_backoff_ms
    );

    println!("\nHTTP:");
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!("  Max connections: {}", config.http.max_connections);
    println!("  Max body bytes: {}", config.http.max_body_bytes);
    println!("  Accept invalid certs: {}", config.http.accept_invalid_certs);
    println!("  User agents: {}", config.http.user_agents.len());

    println!("\nStorage:");
    println!("  Frontier: {}", config.frontier.path);
    println!("  Index: {}", config.index.path);
    println!(
        "  Commit mode: {:?} (every {}s)",
        config.index.commit_mode, config.index.commit_interval_secs
    );
    println!("  Reseed interval: {}s", config.reseed.interval_secs);

    println!("\nBlocked Domains ({}):", config.blocked_domains.len());
    for domain in &config.blocked_domains {
        println!("  - {}", domain);
    }
    println!("\nBlocked Extensions: {}", config.blocked_extensions.join(", "));

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows frontier and index statistics
fn handle_stats(config: &Config) -> Result<()> {
    println!("Frontier: {}", config.frontier.path);
    println!("Index: {}\n", config.index.path);

    let frontier = SqliteFrontier::open(
        Path::new(&config.frontier.path),
        FrontierPolicy::from_config(&config.crawler),
    )
    .context("failed to open frontier")?;
    let index = open_index(config)?;

    let stats = load_statistics(&frontier, index.doc_count())?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --search mode: queries the committed index
fn handle_search(config: &Config, query: &str, limit: usize) -> Result<()> {
    let index = open_index(config)?;
    let hits = index.search(query, limit).context("search failed")?;

    if hits.is_empty() {
        println!("No results for {:?}", query);
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. {} ({:.2})", rank + 1, hit.title, hit.score);
        println!("   {}", hit.url);
        println!("   {}\n", hit.snippet);
    }
    Ok(())
}

fn open_index(config: &Config) -> Result<TantivyIndex> {
    TantivyIndex::open_or_create(
        Path::new(&config.index.path),
        config.index.writer_heap_bytes,
        config.index.max_pending_documents,
    )
    .context("failed to open index")
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> Result<()> {
    tracing::info!(
        "Seeds: {}, blocked domains: {}, workers: {}",
        config.seeds.len(),
        config.blocked_domains.len(),
        config.crawler.workers
    );

    let engine = CrawlEngine::open(config).context("failed to start crawl engine")?;
    if fresh {
        tracing::info!("Starting fresh crawl (clearing frontier)");
        engine.clear_frontier().await?;
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down after in-flight fetches (Ctrl+C again to exit now)");
            signal.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Exiting immediately");
            std::process::exit(130);
        }
    });

    let snapshot = engine.run(shutdown).await.context("crawl failed")?;
    tracing::info!(
        "Crawl finished: {} pages crawled, {} URLs discovered",
        snapshot.crawled,
        snapshot.discovered
    );
    Ok(())
}
