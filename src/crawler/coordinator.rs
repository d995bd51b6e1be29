//! Crawl coordination
//!
//! The coordinator owns one run from start to finish:
//! - Records the run in the store
//! - Seeds the frontier from the configured feeds
//! - Runs a pool of workers that fetch and extract pages
//! - Funnels extracted posts into a single pipeline lane
//! - Stops on cancellation and writes the run's final status

use crate::config::Config;
use crate::crawler::extractor::{ContentExtractor, HtmlExtractor};
use crate::crawler::fetcher::{fetch_with_retry, Fetcher, HttpFetcher, RetryPolicy};
use crate::crawler::frontier::{CrawlTask, Frontier, FrontierStats, TaskKind};
use crate::output::BackupSink;
use crate::pipeline::{ExtractedItem, Pipeline, PipelineStats};
use crate::storage::{open_store, RunCounters, RunStatus, SharedStore};
use crate::{PostcrawlError, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Capacity of the channel between workers and the pipeline lane
const PIPELINE_QUEUE_CAPACITY: usize = 64;

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub frontier: FrontierStats,
    pub pipeline: PipelineStats,
    pub counters: RunCounters,
    pub backup_path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Counters shared by all workers
#[derive(Debug, Default)]
struct WorkerCounters {
    feed_pages: AtomicU64,
    posts_fetched: AtomicU64,
    fetch_errors: AtomicU64,
    extraction_errors: AtomicU64,
}

impl WorkerCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a worker needs, shared behind one `Arc`
struct WorkerContext {
    frontier: Arc<Frontier>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ContentExtractor>,
    policy: RetryPolicy,
    items: mpsc::Sender<ExtractedItem>,
    counters: WorkerCounters,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    config_hash: String,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ContentExtractor>,
    store: SharedStore,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator with the HTTP fetcher, the HTML extractor and
    /// the SQLite store named in the configuration
    pub fn new(config: Config, config_hash: String) -> Result<Self> {
        let store = open_store(Path::new(&config.output.database_path))?;
        let fetcher = HttpFetcher::new(&config)?;

        let mut coordinator = Self::with_components(
            config,
            Arc::new(fetcher),
            Arc::new(HtmlExtractor::new()),
            Arc::new(Mutex::new(store)),
        );
        coordinator.config_hash = config_hash;
        Ok(coordinator)
    }

    /// Creates a coordinator from explicit components
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ContentExtractor>,
        store: SharedStore,
    ) -> Self {
        Self {
            config,
            config_hash: String::new(),
            fetcher,
            extractor,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the crawl when cancelled
    ///
    /// Cancelling closes the frontier: tasks already issued finish, queued
    /// ones are dropped, and the run is recorded as interrupted.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Runs one complete crawl
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();

        let run_id = {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            let stale = store.mark_stale_runs_interrupted()?;
            if stale > 0 {
                tracing::warn!("Marked {} unfinished run(s) as interrupted", stale);
            }
            store.create_run(&self.config_hash)?
        };
        tracing::info!("Starting crawl run {}", run_id);

        let frontier = Arc::new(Frontier::new(&self.config.crawler, &self.config.throttle));
        let sink = match self.prepare(&frontier) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!("Run {} failed to start: {}", run_id, e);
                self.finish_run(run_id, RunStatus::Failed, &RunCounters::default())?;
                return Err(e);
            }
        };

        let pipeline = Pipeline::new(&self.config.pipeline, Arc::clone(&self.store), Some(sink));
        let (items_tx, items_rx) = mpsc::channel(PIPELINE_QUEUE_CAPACITY);
        let lane = spawn_pipeline_lane(pipeline, items_rx);

        let context = Arc::new(WorkerContext {
            frontier: Arc::clone(&frontier),
            fetcher: Arc::clone(&self.fetcher),
            extractor: Arc::clone(&self.extractor),
            policy: RetryPolicy::from_config(&self.config.crawler),
            items: items_tx,
            counters: WorkerCounters::default(),
        });

        let watcher_done = CancellationToken::new();
        let watcher = spawn_cancel_watcher(
            self.cancel.clone(),
            watcher_done.clone(),
            Arc::clone(&frontier),
        );

        if self.cancel.is_cancelled() {
            frontier.close();
        }

        let worker_count = self.config.crawler.max_workers.max(1) as usize;
        let workers: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&context))))
            .collect();

        let mut worker_failure = None;
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task failed: {}", e);
                frontier.close();
                worker_failure.get_or_insert(e);
            }
        }

        watcher_done.cancel();
        watcher.await?;

        // Dropping the last sender lets the lane drain and stop.
        let counters_snapshot = snapshot(&context.counters);
        drop(context);
        let pipeline = lane.await?;
        let summary = pipeline.finish();

        let status = if worker_failure.is_some() || summary.is_err() {
            RunStatus::Failed
        } else if self.cancel.is_cancelled() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        let (pipeline_stats, backup_path) = match &summary {
            Ok(summary) => (summary.stats, summary.backup_path.clone()),
            Err(_) => (PipelineStats::default(), None),
        };

        let counters = RunCounters {
            feed_pages: counters_snapshot.feed_pages,
            posts_fetched: counters_snapshot.posts_fetched,
            posts_stored: pipeline_stats.inserted + pipeline_stats.updated,
            items_dropped: pipeline_stats.dropped(),
            fetch_errors: counters_snapshot.fetch_errors,
        };
        self.finish_run(run_id, status, &counters)?;
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close()?;

        if let Some(e) = worker_failure {
            return Err(e.into());
        }
        summary?;

        let report = RunReport {
            run_id,
            status,
            frontier: frontier.stats(),
            pipeline: pipeline_stats,
            counters,
            backup_path,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Run {} {}: {} feed page(s), {} post(s) fetched, {} stored, {} dropped, {} fetch error(s), {} extraction error(s) in {:?}",
            run_id,
            status.to_db_string(),
            counters.feed_pages,
            counters.posts_fetched,
            counters.posts_stored,
            counters.items_dropped,
            counters.fetch_errors,
            counters_snapshot.extraction_errors,
            report.elapsed
        );

        Ok(report)
    }

    /// Seeds the frontier and opens the backup file
    fn prepare(&self, frontier: &Frontier) -> Result<BackupSink> {
        frontier.seed(&self.config.feed_urls())?;
        let sink = BackupSink::open(
            Path::new(&self.config.output.backup_dir),
            &self.config.pipeline.id_prefix,
        )?;
        Ok(sink)
    }

    fn finish_run(&self, run_id: i64, status: RunStatus, counters: &RunCounters) -> Result<()> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish_run(run_id, status, counters)
            .map_err(PostcrawlError::from)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CountersSnapshot {
    feed_pages: u64,
    posts_fetched: u64,
    fetch_errors: u64,
    extraction_errors: u64,
}

fn snapshot(counters: &WorkerCounters) -> CountersSnapshot {
    CountersSnapshot {
        feed_pages: counters.feed_pages.load(Ordering::Relaxed),
        posts_fetched: counters.posts_fetched.load(Ordering::Relaxed),
        fetch_errors: counters.fetch_errors.load(Ordering::Relaxed),
        extraction_errors: counters.extraction_errors.load(Ordering::Relaxed),
    }
}

/// Runs every extracted item through the pipeline, one at a time
fn spawn_pipeline_lane(
    pipeline: Pipeline,
    mut items: mpsc::Receiver<ExtractedItem>,
) -> JoinHandle<Pipeline> {
    tokio::spawn(async move {
        while let Some(item) = items.recv().await {
            if let Ok(post_id) = pipeline.process(item) {
                tracing::trace!("Exported {}", post_id);
            }
        }
        pipeline
    })
}

fn spawn_cancel_watcher(
    cancel: CancellationToken,
    done: CancellationToken,
    frontier: Arc<Frontier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("Cancellation requested, stopping crawl");
                frontier.close();
            }
            _ = done.cancelled() => {}
        }
    })
}

async fn worker_loop(id: usize, context: Arc<WorkerContext>) {
    let tasks = context.frontier.drain();
    tokio::pin!(tasks);

    while let Some(task) = tasks.next().await {
        match task.kind {
            TaskKind::FeedPage => handle_feed_page(&context, &task).await,
            TaskKind::PostPage => handle_post_page(&context, &task).await,
        }
        context.frontier.task_finished();
    }

    tracing::debug!("Worker {} finished", id);
}

async fn fetch_body(context: &WorkerContext, task: &CrawlTask) -> Option<String> {
    let frontier = &context.frontier;
    let _on_wire = frontier.begin_fetch();
    let result = fetch_with_retry(
        context.fetcher.as_ref(),
        &task.url,
        context.policy,
        |latency, failed| {
            let delay = frontier.observe_response(latency, failed);
            tracing::trace!("Throttle delay now {:?}", delay);
        },
    )
    .await;

    match result {
        Ok(response) => Some(response.body),
        Err(e) => {
            WorkerCounters::bump(&context.counters.fetch_errors);
            tracing::warn!("Failed to fetch {}: {}", task.url, e);
            None
        }
    }
}

async fn handle_feed_page(context: &WorkerContext, task: &CrawlTask) {
    let Some(body) = fetch_body(context, task).await else {
        context.frontier.on_feed_page_failed(task.feed);
        return;
    };
    WorkerCounters::bump(&context.counters.feed_pages);

    match context.extractor.extract_feed(&task.url, &body) {
        Ok(listing) => {
            let outcome = context.frontier.on_feed_page_result(
                task.feed,
                listing.post_urls,
                listing.next_page.as_deref(),
            );
            tracing::info!(
                "{} page {}: {} new post(s){}",
                task.feed,
                task.page_index,
                outcome.new_posts,
                if outcome.exhausted { ", feed exhausted" } else { "" }
            );
        }
        Err(e) => {
            WorkerCounters::bump(&context.counters.extraction_errors);
            tracing::warn!("Failed to parse feed page {}: {}", task.url, e);
            context.frontier.on_feed_page_failed(task.feed);
        }
    }
}

async fn handle_post_page(context: &WorkerContext, task: &CrawlTask) {
    let Some(body) = fetch_body(context, task).await else {
        return;
    };
    WorkerCounters::bump(&context.counters.posts_fetched);

    let item = match context.extractor.extract_post(&task.url, &body) {
        Ok(item) => item,
        Err(e) => {
            WorkerCounters::bump(&context.counters.extraction_errors);
            tracing::warn!("Failed to parse post {}: {}", task.url, e);
            return;
        }
    };

    if context.items.send(item).await.is_err() {
        tracing::error!("Pipeline lane closed, dropping {}", task.url);
    }
}
