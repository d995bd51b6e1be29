//! HTTP fetching
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Per-domain concurrency caps
//! - robots.txt checks
//! - Retry with exponential backoff for transient failures

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::robots::RobotsCache;
use crate::url::extract_domain;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

/// A fetched page
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,

    /// Time from sending the request to reading the whole body
    pub latency: Duration,

    /// URL after redirects
    pub final_url: Url,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why a fetch produced no usable body
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Disallowed by robots.txt")]
    RobotsDenied,

    #[error("Request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts, connection failures, 408, 429 and 5xx are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status(code) => matches!(code, 408 | 429 | 500..=599),
            Self::RobotsDenied | Self::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Transport used by the crawl workers
///
/// Implementations return the response for any HTTP status; classifying
/// statuses is left to [`fetch_with_retry`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, TransportError>;
}

/// Builds an HTTP client identifying the crawler
///
/// The user agent has the form `Name/Version (+ContactURL; ContactEmail)`.
///
/// # Example
///
/// ```no_run
/// use postcrawl::config::UserAgentConfig;
/// use postcrawl::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "postcrawl".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher with per-domain concurrency caps and robots.txt checks
pub struct HttpFetcher {
    client: Client,
    robots: Option<RobotsCache>,
    max_per_domain: usize,
    domain_permits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent)?;
        let robots = config.crawler.obey_robots.then(|| {
            RobotsCache::new(
                client.clone(),
                &config.user_agent.crawler_name,
                config.crawler.fetch_timeout(),
            )
        });

        Ok(Self {
            client,
            robots,
            max_per_domain: config.crawler.max_concurrent_per_domain.max(1) as usize,
            domain_permits: Mutex::new(HashMap::new()),
        })
    }

    fn domain_semaphore(&self, url: &Url) -> Arc<Semaphore> {
        let domain = extract_domain(url).unwrap_or_default();
        let mut permits = self
            .domain_permits
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            permits
                .entry(domain)
                .or_insert_with(|| Arc::new(Semaphore::new(self.max_per_domain))),
        )
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchResponse, TransportError> {
        if let Some(robots) = &self.robots {
            if !robots.is_allowed(url).await {
                return Err(TransportError::RobotsDenied);
            }
        }

        let _permit = self
            .domain_semaphore(url)
            .acquire_owned()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await?;

        Ok(FetchResponse {
            status,
            body,
            latency: started.elapsed(),
            final_url,
        })
    }
}

/// Attempt limits for one task
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Limit for a single attempt
    pub timeout: Duration,

    /// Attempts after the first one
    pub retries: u32,

    /// Pause before the first retry, doubled for each further one
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            retries: config.retry_count,
            backoff: config.retry_backoff(),
        }
    }
}

/// Fetches a URL, retrying retryable failures with exponential backoff
///
/// Non-2xx responses become [`TransportError::Status`]. `observe` is called
/// after every attempt that reached (or timed out on) the server, with the
/// attempt's latency and whether it failed in a retryable way.
pub async fn fetch_with_retry<F, O>(
    fetcher: &F,
    url: &Url,
    policy: RetryPolicy,
    mut observe: O,
) -> Result<FetchResponse, TransportError>
where
    F: Fetcher + ?Sized,
    O: FnMut(Duration, bool),
{
    let mut backoff = policy.backoff;
    let mut attempt = 0;

    loop {
        let started = Instant::now();
        let result = match tokio::time::timeout(policy.timeout, fetcher.fetch(url, policy.timeout))
            .await
        {
            Ok(Ok(response)) if response.is_success() => Ok(response),
            Ok(Ok(response)) => Err(TransportError::Status(response.status)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::Timeout),
        };

        let error = match result {
            Ok(response) => {
                observe(response.latency, false);
                return Ok(response);
            }
            Err(e) => e,
        };

        if error != TransportError::RobotsDenied {
            observe(started.elapsed(), error.is_retryable());
        }

        if !error.is_retryable() || attempt >= policy.retries {
            return Err(error);
        }

        attempt += 1;
        tracing::debug!(
            "Retrying {} in {:?} (attempt {} of {}): {}",
            url,
            backoff,
            attempt,
            policy.retries,
            error
        );
        tokio::time::sleep(backoff).await;
        backoff = backoff.saturating_mul(2);
    }
}
