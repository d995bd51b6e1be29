use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for postcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub throttle: ThrottleConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "feed")]
    pub feeds: Vec<FeedEntry>,
}

impl Config {
    /// Returns the seed URLs of all configured feeds, in file order
    pub fn feed_urls(&self) -> Vec<String> {
        self.feeds.iter().map(|f| f.url.clone()).collect()
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of feed pages fetched per feed, first page included
    #[serde(rename = "max-pages-per-feed")]
    pub max_pages_per_feed: u32,

    /// Number of worker tasks pulling from the frontier
    #[serde(rename = "max-workers")]
    pub max_workers: u32,

    /// Maximum number of simultaneous requests to one host
    #[serde(rename = "max-concurrent-per-domain")]
    pub max_concurrent_per_domain: u32,

    /// Timeout of a single fetch attempt (milliseconds)
    #[serde(rename = "fetch-timeout")]
    pub fetch_timeout: u64,

    /// Additional attempts after a retryable failure
    #[serde(rename = "retry-count")]
    pub retry_count: u32,

    /// Delay before the first retry (milliseconds), doubled per attempt
    #[serde(rename = "retry-backoff")]
    pub retry_backoff: u64,

    /// Build `?page=N` URLs when a feed page has no next link
    #[serde(rename = "synthesize-pagination", default = "default_true")]
    pub synthesize_pagination: bool,

    #[serde(rename = "obey-robots", default = "default_true")]
    pub obey_robots: bool,

    /// Host patterns post URLs must match; empty allows every host
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,
}

impl CrawlerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff)
    }
}

/// Adaptive politeness delay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Floor and starting value of the delay (milliseconds)
    #[serde(rename = "min-delay")]
    pub min_delay: u64,

    /// Ceiling of the delay (milliseconds)
    #[serde(rename = "max-delay")]
    pub max_delay: u64,

    /// Average number of requests the remote side should be serving at once
    #[serde(rename = "target-concurrency")]
    pub target_concurrency: f64,

    /// Randomization fraction applied to each sampled delay
    #[serde(default)]
    pub jitter: f64,
}

impl ThrottleConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Record labelling used by the validation stage
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(rename = "source-website")]
    pub source_website: String,

    /// Prefix of every post identifier and backup file name
    #[serde(rename = "id-prefix")]
    pub id_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_website: "dev.to".to_string(),
            id_prefix: "devto".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory the JSON backup is written to
    #[serde(rename = "backup-dir")]
    pub backup_dir: String,
}

/// A starting feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub url: String,
}

fn default_true() -> bool {
    true
}
