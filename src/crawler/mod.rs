//! Crawler module for feed walking and post fetching
//!
//! This module contains the core crawling logic, including:
//! - The frontier of feed and post tasks with per-feed pagination
//! - Adaptive throttling of request starts
//! - HTTP fetching with retry logic and robots.txt checks
//! - Feed and post extraction
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod throttle;

pub use coordinator::{Coordinator, RunReport};
pub use extractor::{ContentExtractor, ExtractionError, FeedListing, HtmlExtractor};
pub use fetcher::{
    build_http_client, fetch_with_retry, FetchResponse, Fetcher, HttpFetcher, RetryPolicy,
    TransportError,
};
pub use frontier::{CrawlTask, FeedPageOutcome, Frontier, FrontierError, FrontierStats, TaskKind};
pub use throttle::ThrottleController;

use crate::config::Config;
use crate::Result;

/// Runs a complete crawl with the default components
///
/// # Example
///
/// ```no_run
/// use postcrawl::config::load_config_with_hash;
/// use postcrawl::crawler::crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let report = crawl(config, hash).await?;
/// println!("stored {} post(s)", report.counters.posts_stored);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config, config_hash: String) -> Result<RunReport> {
    Coordinator::new(config, config_hash)?.run().await
}
