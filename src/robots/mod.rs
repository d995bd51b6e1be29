//! Robots.txt handling module
//!
//! Fetches `/robots.txt` once per origin, caches it for 24 hours and answers
//! whether a URL may be crawled. A robots.txt that cannot be fetched allows
//! everything.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Builds the robots.txt URL for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    let mut robots = url.clone();
    robots.host_str()?;
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots)
}

/// Fetches and parses robots.txt for the origin of `url`
///
/// Any transport failure or non-success status yields an allow-all policy.
pub async fn fetch_robots(client: &Client, url: &Url, timeout: Duration) -> ParsedRobots {
    let Some(robots_url) = robots_url(url) else {
        return ParsedRobots::allow_all();
    };

    let response = match client.get(robots_url.clone()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt unreachable at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} returned {}, allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Failed to read robots.txt at {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_url() {
        let url = Url::parse("https://dev.to/ben/post?x=1#top").unwrap();
        assert_eq!(
            robots_url(&url).unwrap().as_str(),
            "https://dev.to/robots.txt"
        );
    }

    #[test]
    fn test_robots_url_keeps_port() {
        let url = Url::parse("http://127.0.0.1:8080/feed").unwrap();
        assert_eq!(
            robots_url(&url).unwrap().as_str(),
            "http://127.0.0.1:8080/robots.txt"
        );
    }
}
