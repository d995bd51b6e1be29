//! Crawl frontier: pending tasks, visited URLs and per-feed pagination
//!
//! The frontier is the single owner of crawl progress. Workers pull tasks
//! from it through [`Frontier::drain`] and report back through
//! [`Frontier::on_feed_page_result`], [`Frontier::on_feed_page_failed`] and
//! [`Frontier::task_finished`]. All state sits behind one mutex; waiting
//! workers park on a `Notify` until new work arrives or the crawl ends.
//!
//! Request pacing is handled here too: every issued task is given a start
//! slot spaced by the throttle's sampled delay. The throttle sees only the
//! requests actually on the wire, counted through [`Frontier::begin_fetch`].

use crate::config::{CrawlerConfig, ThrottleConfig};
use crate::crawler::throttle::ThrottleController;
use crate::state::{FeedId, FeedState, FeedStatus};
use crate::url::{canonicalize_url, is_allowed_domain, resolve_link, synthesize_page_url};
use futures::stream::{self, Stream};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use url::Url;

/// Errors raised by the frontier
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("No valid feed URLs to seed the frontier")]
    NoFeeds,
}

/// What a fetched page is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// A listing page of a feed
    FeedPage,

    /// A single post
    PostPage,
}

/// One unit of fetch work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub feed: FeedId,
    pub url: Url,

    /// Feed page index the task belongs to (for posts: where they were listed)
    pub page_index: u32,
    pub kind: TaskKind,
}

/// Result of applying one feed page to the frontier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPageOutcome {
    /// Post tasks newly enqueued
    pub new_posts: usize,

    /// Next feed page enqueued, if any
    pub next_page: Option<Url>,

    /// Whether the feed is now exhausted
    pub exhausted: bool,
}

/// Counters describing frontier activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierStats {
    pub feeds_seeded: usize,
    pub feeds_exhausted: usize,
    pub feed_pages_enqueued: usize,
    pub posts_enqueued: usize,
    pub duplicate_posts: usize,
    pub offsite_posts: usize,
    pub tasks_issued: usize,
}

struct FrontierInner {
    feeds: Vec<FeedState>,
    visited: HashSet<String>,
    ready: VecDeque<CrawlTask>,
    in_flight: usize,
    closed: bool,
    next_slot: Option<Instant>,
    stats: FrontierStats,
}

impl FrontierInner {
    fn has_active_feed(&self) -> bool {
        self.feeds.iter().any(FeedState::is_active)
    }

    fn exhaust(&mut self, id: FeedId, reason: &str) {
        if let Some(feed) = self.feeds.get_mut(id.0) {
            if feed.is_active() {
                feed.exhaust();
                self.stats.feeds_exhausted += 1;
                tracing::info!(
                    "{} exhausted after page {} ({}): {}",
                    id,
                    feed.page_index,
                    reason,
                    feed.base_url
                );
            }
        }
    }
}

/// Decision taken under the lock by `next_task`
enum Step {
    Issue(CrawlTask, Instant),
    Wait,
    Done,
}

/// Marks one request as on the wire until dropped
#[must_use = "the fetch counts as finished as soon as the guard is dropped"]
pub struct FetchGuard<'a> {
    fetching: &'a AtomicUsize,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.fetching.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Shared crawl frontier
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
    fetching: AtomicUsize,
    throttle: ThrottleController,
    max_pages_per_feed: u32,
    synthesize_pagination: bool,
    allowed_domains: Vec<String>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new(crawler: &CrawlerConfig, throttle: &ThrottleConfig) -> Self {
        Self {
            inner: Mutex::new(FrontierInner {
                feeds: Vec::new(),
                visited: HashSet::new(),
                ready: VecDeque::new(),
                in_flight: 0,
                closed: false,
                next_slot: None,
                stats: FrontierStats::default(),
            }),
            notify: Notify::new(),
            fetching: AtomicUsize::new(0),
            throttle: ThrottleController::new(throttle),
            max_pages_per_feed: crawler.max_pages_per_feed.max(1),
            synthesize_pagination: crawler.synthesize_pagination,
            allowed_domains: crawler.allowed_domains.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the starting feeds and enqueues their first pages
    ///
    /// Unparseable and duplicate feed URLs are skipped with a warning.
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Number of feeds seeded
    /// * `Err(FrontierError::NoFeeds)` - No feed could be seeded
    pub fn seed<S: AsRef<str>>(&self, feed_urls: &[S]) -> Result<usize, FrontierError> {
        let mut inner = self.lock();
        let mut seeded = 0;

        for raw in feed_urls {
            let raw = raw.as_ref();
            let url = match canonicalize_url(raw) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping feed '{}': {}", raw, e);
                    continue;
                }
            };

            if !inner.visited.insert(url.as_str().to_string()) {
                tracing::warn!("Skipping duplicate feed: {}", url);
                continue;
            }

            let id = FeedId(inner.feeds.len());
            inner.feeds.push(FeedState::new(id, url.clone()));
            inner.ready.push_back(CrawlTask {
                feed: id,
                url,
                page_index: 1,
                kind: TaskKind::FeedPage,
            });
            inner.stats.feeds_seeded += 1;
            inner.stats.feed_pages_enqueued += 1;
            seeded += 1;
        }

        if seeded == 0 {
            return Err(FrontierError::NoFeeds);
        }

        tracing::info!("Seeded frontier with {} feed(s)", seeded);
        drop(inner);
        self.notify.notify_waiters();
        Ok(seeded)
    }

    /// Waits for the next task, paced by the throttle
    ///
    /// Returns `None` once the frontier is closed, or once every feed is
    /// exhausted and no task is ready.
    pub async fn next_task(&self) -> Option<CrawlTask> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            let step = {
                let mut inner = self.lock();
                if inner.closed {
                    Step::Done
                } else if let Some(task) = inner.ready.pop_front() {
                    let now = Instant::now();
                    let slot = inner.next_slot.map_or(now, |s| s.max(now));
                    inner.next_slot = Some(slot + self.throttle.sample_delay());
                    inner.in_flight += 1;
                    inner.stats.tasks_issued += 1;
                    Step::Issue(task, slot)
                } else if inner.has_active_feed() {
                    notified.as_mut().enable();
                    Step::Wait
                } else {
                    Step::Done
                }
            };

            match step {
                Step::Issue(task, slot) => {
                    if !self.wait_for_slot(slot).await {
                        self.task_finished();
                        return None;
                    }
                    tracing::debug!("Issuing {:?} task for {}", task.kind, task.url);
                    return Some(task);
                }
                Step::Wait => notified.await,
                Step::Done => return None,
            }
        }
    }

    /// Sleeps until `slot`, returning false early if the frontier closes
    async fn wait_for_slot(&self, slot: Instant) -> bool {
        let sleep = tokio::time::sleep_until(slot);
        tokio::pin!(sleep);

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return false;
            }

            tokio::select! {
                _ = &mut sleep => return !self.is_closed(),
                _ = notified => {}
            }
        }
    }

    /// Returns a stream of ready tasks that ends when the crawl is over
    pub fn drain(self: &Arc<Self>) -> impl Stream<Item = CrawlTask> + Send + 'static {
        stream::unfold(Arc::clone(self), |frontier| async move {
            let task = frontier.next_task().await?;
            Some((task, frontier))
        })
    }

    /// Applies the links found on a feed page
    ///
    /// New post URLs are enqueued as post tasks. The next feed page is
    /// enqueued when the page limit allows it, taken from `next_link` or
    /// synthesized from the feed's base URL. Otherwise the feed is exhausted.
    pub fn on_feed_page_result(
        &self,
        feed: FeedId,
        post_urls: Vec<Url>,
        next_link: Option<&str>,
    ) -> FeedPageOutcome {
        let mut outcome = FeedPageOutcome::default();
        let mut inner = self.lock();

        let (page_index, current_url, base_url) = match inner.feeds.get(feed.0) {
            Some(state) if state.is_active() => (
                state.page_index,
                state.current_url.clone(),
                state.base_url.clone(),
            ),
            _ => {
                tracing::warn!("Ignoring feed page result for inactive {}", feed);
                outcome.exhausted = true;
                return outcome;
            }
        };

        if inner.closed {
            return outcome;
        }

        let discovered = post_urls.len();
        for url in post_urls {
            let canonical = match canonicalize_url(url.as_str()) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping post link {}: {}", url, e);
                    continue;
                }
            };

            if !is_allowed_domain(&canonical, &self.allowed_domains) {
                inner.stats.offsite_posts += 1;
                tracing::debug!("Skipping offsite post {}", canonical);
                continue;
            }

            if !inner.visited.insert(canonical.as_str().to_string()) {
                inner.stats.duplicate_posts += 1;
                continue;
            }

            inner.ready.push_back(CrawlTask {
                feed,
                url: canonical,
                page_index,
                kind: TaskKind::PostPage,
            });
            inner.stats.posts_enqueued += 1;
            outcome.new_posts += 1;
        }

        tracing::debug!(
            "{} page {}: {} post link(s), {} new",
            feed,
            page_index,
            discovered,
            outcome.new_posts
        );

        if page_index >= self.max_pages_per_feed {
            inner.exhaust(feed, "page limit reached");
        } else {
            let next = match next_link.and_then(|href| resolve_link(href, &current_url)) {
                Some(link) => canonicalize_url(link.as_str()).ok(),
                None if self.synthesize_pagination && discovered > 0 => {
                    Some(synthesize_page_url(&base_url, page_index + 1))
                }
                None => None,
            };

            match next {
                None => inner.exhaust(feed, "no next page"),
                Some(next) if inner.visited.contains(next.as_str()) => {
                    inner.exhaust(feed, "next page already visited")
                }
                Some(next) => {
                    inner.visited.insert(next.as_str().to_string());
                    if let Some(state) = inner.feeds.get_mut(feed.0) {
                        state.advance(next.clone());
                    }
                    inner.ready.push_back(CrawlTask {
                        feed,
                        url: next.clone(),
                        page_index: page_index + 1,
                        kind: TaskKind::FeedPage,
                    });
                    inner.stats.feed_pages_enqueued += 1;
                    outcome.next_page = Some(next);
                }
            }
        }

        outcome.exhausted = inner
            .feeds
            .get(feed.0)
            .map_or(true, |state| state.status == FeedStatus::Exhausted);

        drop(inner);
        self.notify.notify_waiters();
        outcome
    }

    /// Marks a feed exhausted after its page could not be fetched or parsed
    pub fn on_feed_page_failed(&self, feed: FeedId) {
        self.lock().exhaust(feed, "feed page failed");
        self.notify.notify_waiters();
    }

    /// Records that a worker is done with an issued task
    pub fn task_finished(&self) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Counts a request as on the wire until the guard is dropped
    pub fn begin_fetch(&self) -> FetchGuard<'_> {
        self.fetching.fetch_add(1, Ordering::Relaxed);
        FetchGuard {
            fetching: &self.fetching,
        }
    }

    /// Requests currently on the wire
    pub fn fetching(&self) -> usize {
        self.fetching.load(Ordering::Relaxed)
    }

    /// Feeds one response (or failed attempt) into the throttle
    ///
    /// Load is judged by the requests on the wire, not by tasks that are
    /// still waiting for their pacing slot.
    pub fn observe_response(&self, latency: Duration, failed: bool) -> Duration {
        self.throttle.observe(latency, self.fetching(), failed)
    }

    /// Stops issuing tasks; every `drain` stream ends
    pub fn close(&self) {
        let mut inner = self.lock();
        if !inner.closed {
            inner.closed = true;
            let dropped = inner.ready.len();
            inner.ready.clear();
            tracing::info!("Frontier closed, {} pending task(s) dropped", dropped);
        }
        drop(inner);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Current throttle delay
    pub fn current_delay(&self) -> Duration {
        self.throttle.current_delay()
    }

    pub fn stats(&self) -> FrontierStats {
        self.lock().stats.clone()
    }

    /// Snapshot of every feed's pagination state
    pub fn feeds(&self) -> Vec<FeedState> {
        self.lock().feeds.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn pending(&self) -> usize {
        self.lock().ready.len()
    }

    /// Returns true if the canonical form of `url` has been enqueued this run
    pub fn is_visited(&self, url: &Url) -> bool {
        canonicalize_url(url.as_str())
            .map(|c| self.lock().visited.contains(c.as_str()))
            .unwrap_or(false)
    }
}
