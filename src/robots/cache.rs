//! Per-origin robots.txt cache with 24 hour expiry

use crate::robots::{fetch_robots, ParsedRobots};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use url::Url;

/// Robots.txt rules together with the time they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Shared robots.txt cache keyed by origin (`scheme://host:port`)
///
/// Each origin owns its own cell, so only callers waiting on the same origin
/// wait on its robots.txt fetch.
pub struct RobotsCache {
    client: Client,
    product_token: String,
    timeout: std::time::Duration,
    entries: Mutex<HashMap<String, Arc<OnceCell<CachedRobots>>>>,
}

impl RobotsCache {
    /// `product_token` is the crawler name matched against `User-agent` lines
    pub fn new(client: Client, product_token: &str, timeout: std::time::Duration) -> Self {
        Self {
            client,
            product_token: product_token.to_string(),
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if robots.txt for the URL's origin allows fetching it
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        let cell = self.cell_for(&origin);

        let cached = cell
            .get_or_init(|| async {
                let robots = fetch_robots(&self.client, url, self.timeout).await;
                tracing::debug!("Cached robots.txt for {}", origin);
                CachedRobots::new(robots)
            })
            .await;

        cached.content.is_allowed(url.as_str(), &self.product_token)
    }

    /// Inserts rules for an origin without fetching
    pub fn insert(&self, origin: &str, robots: ParsedRobots) {
        self.lock_entries().insert(
            origin.to_string(),
            Arc::new(OnceCell::from(CachedRobots::new(robots))),
        );
    }

    /// The origin's cell, replaced by an empty one once its rules are stale
    fn cell_for(&self, origin: &str) -> Arc<OnceCell<CachedRobots>> {
        let mut entries = self.lock_entries();
        let cell = entries.entry(origin.to_string()).or_default();
        if cell.get().is_some_and(CachedRobots::is_stale) {
            *cell = Arc::default();
        }
        Arc::clone(cell)
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Arc<OnceCell<CachedRobots>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_new_cache_not_stale() {
        let cache = CachedRobots::new(ParsedRobots::allow_all());
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_cache_is_stale_after_25_hours() {
        let mut cache = CachedRobots::new(ParsedRobots::allow_all());
        cache.fetched_at = Utc::now() - Duration::hours(25);
        assert!(cache.is_stale());
    }

    #[test]
    fn test_cache_not_stale_at_23_hours() {
        let mut cache = CachedRobots::new(ParsedRobots::allow_all());
        cache.fetched_at = Utc::now() - Duration::hours(23);
        assert!(!cache.is_stale());
    }

    #[tokio::test]
    async fn test_inserted_rules_used_without_fetch() {
        let cache = RobotsCache::new(
            Client::new(),
            "postcrawl",
            std::time::Duration::from_millis(200),
        );
        cache.insert(
            "https://dev.to",
            ParsedRobots::from_content("User-agent: *\nDisallow: /search"),
        );

        let allowed = Url::parse("https://dev.to/latest").unwrap();
        let denied = Url::parse("https://dev.to/search?q=rust").unwrap();
        assert!(cache.is_allowed(&allowed).await);
        assert!(!cache.is_allowed(&denied).await);
    }

    #[tokio::test]
    async fn test_stale_rules_refetched() {
        let cache = RobotsCache::new(
            Client::new(),
            "postcrawl",
            std::time::Duration::from_millis(200),
        );
        let mut stale = CachedRobots::new(ParsedRobots::from_content("User-agent: *\nDisallow: /"));
        stale.fetched_at = Utc::now() - Duration::hours(25);
        cache
            .lock_entries()
            .insert("http://127.0.0.1:9".to_string(), Arc::new(OnceCell::from(stale)));

        // Port 9 refuses the connection, and an unreachable robots.txt allows all
        let url = Url::parse("http://127.0.0.1:9/post").unwrap();
        assert!(cache.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn test_slow_origin_does_not_block_others() {
        let slow = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nAllow: /")
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&slow)
            .await;

        let fast = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
            .mount(&fast)
            .await;

        let cache = Arc::new(RobotsCache::new(
            Client::new(),
            "postcrawl",
            std::time::Duration::from_secs(10),
        ));

        let slow_url = Url::parse(&format!("{}/post", slow.uri())).unwrap();
        let pending = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.is_allowed(&slow_url).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let fast_url = Url::parse(&format!("{}/private/post", fast.uri())).unwrap();
        let started = std::time::Instant::now();
        assert!(!cache.is_allowed(&fast_url).await);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(!pending.is_finished());

        pending.abort();
    }
}
