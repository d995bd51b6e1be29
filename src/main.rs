//! Postcrawl main entry point
//!
//! This is the command-line interface for the postcrawl feed crawler.

use clap::Parser;
use postcrawl::config::{load_config_with_hash, Config};
use postcrawl::crawler::Coordinator;
use postcrawl::output::{load_statistics, print_statistics};
use postcrawl::storage::open_store;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Postcrawl: a polite paginated-feed crawler
///
/// Postcrawl walks the feed pages of a blog platform, fetches every post
/// it finds once, and stores the validated posts in SQLite with a JSON
/// backup of each run.
#[derive(Parser, Debug)]
#[command(name = "postcrawl")]
#[command(version = "1.0.0")]
#[command(about = "A polite paginated-feed crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Override the number of feed pages crawled per feed
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pages: Option<u32>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(pages) = cli.pages {
        tracing::info!("Limiting crawl to {} page(s) per feed", pages);
        config.crawler.max_pages_per_feed = pages;
    }

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("postcrawl=info,warn"),
            1 => EnvFilter::new("postcrawl=debug,info"),
            2 => EnvFilter::new("postcrawl=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated crawl plan
fn handle_dry_run(config: &Config) {
    println!("=== Postcrawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Pages per feed: {}", config.crawler.max_pages_per_feed);
    println!("  Workers: {}", config.crawler.max_workers);
    println!(
        "  Concurrent requests per domain: {}",
        config.crawler.max_concurrent_per_domain
    );
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout);
    println!(
        "  Retries: {} (backoff {}ms)",
        config.crawler.retry_count, config.crawler.retry_backoff
    );
    println!(
        "  Synthesize pagination: {}",
        config.crawler.synthesize_pagination
    );
    println!("  Obey robots.txt: {}", config.crawler.obey_robots);
    if config.crawler.allowed_domains.is_empty() {
        println!("  Allowed domains: any");
    } else {
        println!(
            "  Allowed domains: {}",
            config.crawler.allowed_domains.join(", ")
        );
    }

    println!("\nThrottle:");
    println!(
        "  Delay: {}ms - {}ms",
        config.throttle.min_delay, config.throttle.max_delay
    );
    println!(
        "  Target concurrency: {}",
        config.throttle.target_concurrency
    );
    println!("  Jitter: {}", config.throttle.jitter);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Backup directory: {}", config.output.backup_dir);
    println!(
        "  Records labelled: {} ({}_*)",
        config.pipeline.source_website, config.pipeline.id_prefix
    );

    println!("\nFeeds ({}):", config.feeds.len());
    for feed in &config.feeds {
        println!("  - {}", feed.url);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl up to {} feed page(s)",
        config.feeds.len() as u64 * u64::from(config.crawler.max_pages_per_feed)
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Crawling {} feed(s), up to {} page(s) each",
        config.feeds.len(),
        config.crawler.max_pages_per_feed
    );

    let coordinator = Coordinator::new(config, config_hash)?;

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            cancel.cancel();
        }
    });

    match coordinator.run().await {
        Ok(report) => {
            println!("\nRun {}: {}", report.run_id, report.status.to_db_string());
            println!("  Feed pages fetched: {}", report.counters.feed_pages);
            println!("  Posts fetched: {}", report.counters.posts_fetched);
            println!(
                "  Posts stored: {} ({} new, {} updated)",
                report.counters.posts_stored, report.pipeline.inserted, report.pipeline.updated
            );
            println!("  Items dropped: {}", report.counters.items_dropped);
            println!("  Fetch errors: {}", report.counters.fetch_errors);
            if let Some(path) = &report.backup_path {
                println!("  Backup: {}", path.display());
            }
            println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
