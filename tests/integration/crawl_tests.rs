//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small paginated blog and run the
//! full crawl cycle end-to-end: fetch, extract, pipeline, store, backup.

use postcrawl::config::{
    Config, CrawlerConfig, FeedEntry, OutputConfig, PipelineConfig, ThrottleConfig,
    UserAgentConfig,
};
use postcrawl::crawler::Coordinator;
use postcrawl::pipeline::make_post_id;
use postcrawl::storage::{open_store, RunStatus, Store};
use postcrawl::{canonicalize_url, PostRecord};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling one feed into `dir`
fn create_test_config(feed_url: String, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_pages_per_feed: 2,
            max_workers: 3,
            max_concurrent_per_domain: 2,
            fetch_timeout: 5000,
            retry_count: 2,
            retry_backoff: 1,
            synthesize_pagination: true,
            obey_robots: false,
            allowed_domains: vec![],
        },
        throttle: ThrottleConfig {
            min_delay: 0,
            max_delay: 100,
            target_concurrency: 2.0,
            jitter: 0.0,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        pipeline: PipelineConfig::default(),
        output: OutputConfig {
            database_path: dir.join("posts.db").display().to_string(),
            backup_dir: dir.join("data").display().to_string(),
        },
        feeds: vec![FeedEntry { url: feed_url }],
    }
}

fn feed_page(posts: &[&str], next: Option<&str>) -> String {
    let stories: String = posts
        .iter()
        .map(|p| {
            format!(
                r#"<article class="crayons-story"><h2><a href="{}">{}</a></h2></article>"#,
                p, p
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a rel="next" href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!("<html><body>{}{}</body></html>", stories, next)
}

fn post_page(title: &str, author: &str, reactions: &str) -> String {
    format!(
        r#"<html><head><meta name="description" content="About {title}"></head><body>
        <h1>{title}</h1>
        <div class="author"><a href="/{author}">{author}</a></div>
        <span data-reactions-count="{reactions}"></span>
        <div id="article-body"><p>Body of {title}</p></div>
        </body></html>"#
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html")
}

/// Mounts a two-page feed with four distinct posts, one listed twice
///
/// Every page is expected to be fetched exactly once per run.
async fn mount_blog(server: &MockServer, runs: u64) {
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(html(feed_page(
            &["/ada/one", "/ada/two", "/bob/three"],
            Some("/feed/page/2"),
        )))
        .expect(runs)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/feed/page/2"))
        .respond_with(html(feed_page(&["/bob/three", "/bob/four"], None)))
        .expect(runs)
        .mount(server)
        .await;

    for (route, title, author) in [
        ("/ada/one", "One", "ada"),
        ("/ada/two", "Two", "ada"),
        ("/bob/three", "Three", "bob"),
        ("/bob/four", "Four", "bob"),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html(post_page(title, author, "42 reactions")))
            .expect(runs)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_full_crawl_two_feed_pages() {
    let mock_server = MockServer::start().await;
    mount_blog(&mock_server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(format!("{}/feed", mock_server.uri()), dir.path());

    let coordinator = Coordinator::new(config, "hash".to_string()).expect("coordinator");
    let report = coordinator.run().await.expect("crawl should succeed");

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.counters.feed_pages, 2);
    assert_eq!(report.counters.posts_fetched, 4);
    assert_eq!(report.counters.posts_stored, 4);
    assert_eq!(report.counters.fetch_errors, 0);
    assert_eq!(report.frontier.duplicate_posts, 1);

    let store = open_store(&dir.path().join("posts.db")).unwrap();
    assert_eq!(store.count_posts().unwrap(), 4);

    let url = canonicalize_url(&format!("{}/ada/one", mock_server.uri())).unwrap();
    let stored = store
        .get_post(&make_post_id("devto", &url))
        .unwrap()
        .expect("post one stored");
    assert_eq!(stored.record.title, "One");
    assert_eq!(stored.record.author_name, "ada");
    assert_eq!(stored.record.likes_count, 42);
    assert_eq!(stored.record.excerpt.as_deref(), Some("About One"));
    assert_eq!(stored.record.source_website, "dev.to");

    let run = store.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash");

    let backup = report.backup_path.expect("backup written");
    let records: Vec<PostRecord> =
        serde_json::from_str(&std::fs::read_to_string(backup).unwrap()).unwrap();
    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let mock_server = MockServer::start().await;
    mount_blog(&mock_server, 2).await;

    let dir = TempDir::new().unwrap();

    let first = Coordinator::new(
        create_test_config(format!("{}/feed", mock_server.uri()), dir.path()),
        "hash".to_string(),
    )
    .unwrap()
    .run()
    .await
    .unwrap();
    assert_eq!(first.pipeline.inserted, 4);

    let second = Coordinator::new(
        create_test_config(format!("{}/feed", mock_server.uri()), dir.path()),
        "hash".to_string(),
    )
    .unwrap()
    .run()
    .await
    .unwrap();
    assert_eq!(second.pipeline.inserted, 0);
    assert_eq!(second.pipeline.updated, 4);

    let store = open_store(&dir.path().join("posts.db")).unwrap();
    assert_eq!(store.count_posts().unwrap(), 4);
    assert_eq!(store.get_latest_run().unwrap().unwrap().id, second.run_id);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(html(feed_page(&["/ada/flaky"], None)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ada/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ada/flaky"))
        .respond_with(html(post_page("Flaky", "ada", "3")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(format!("{}/feed", mock_server.uri()), dir.path());
    config.crawler.max_pages_per_feed = 1;

    let report = Coordinator::new(config, "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.counters.fetch_errors, 0);
    assert_eq!(report.counters.posts_stored, 1);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(html(feed_page(&["/ada/public", "/private/secret"], None)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ada/public"))
        .respond_with(html(post_page("Public", "ada", "1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html(post_page("Secret", "ada", "1")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(format!("{}/feed", mock_server.uri()), dir.path());
    config.crawler.obey_robots = true;
    config.crawler.max_pages_per_feed = 1;

    let report = Coordinator::new(config, "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.counters.posts_stored, 1);
    assert_eq!(report.counters.fetch_errors, 1);
}

#[tokio::test]
async fn test_incomplete_posts_are_dropped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(html(feed_page(&["/ada/good", "/ada/untitled"], None)))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ada/good"))
        .respond_with(html(post_page("Good", "ada", "5")))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ada/untitled"))
        .respond_with(html(
            r#"<html><body><div class="author"><a href="/ada">ada</a></div></body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(format!("{}/feed", mock_server.uri()), dir.path());
    config.crawler.max_pages_per_feed = 1;

    let report = Coordinator::new(config, "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.counters.posts_fetched, 2);
    assert_eq!(report.counters.posts_stored, 1);
    assert_eq!(report.pipeline.dropped_missing_field, 1);

    let records: Vec<PostRecord> = serde_json::from_str(
        &std::fs::read_to_string(report.backup_path.unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Good");
}
