//! Statistics read back from the store

use crate::output::OutputError;
use crate::storage::{RunRecord, Store};

const TOP_AUTHORS: usize = 10;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    pub total_posts: u64,

    /// Most prolific authors with their post counts
    pub top_authors: Vec<(String, u64)>,

    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from the store
pub fn load_statistics(store: &dyn Store) -> Result<StoreStatistics, OutputError> {
    Ok(StoreStatistics {
        total_posts: store.count_posts()?,
        top_authors: store.top_authors(TOP_AUTHORS)?,
        latest_run: store.get_latest_run()?,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Total posts: {}", stats.total_posts);
    println!();

    if !stats.top_authors.is_empty() {
        println!("Top authors:");
        for (author, count) in &stats.top_authors {
            println!("  {:<32} {}", author, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Config hash: {}", run.config_hash);
            println!("  Feed pages: {}", run.counters.feed_pages);
            println!("  Posts fetched: {}", run.counters.posts_fetched);
            println!("  Posts stored: {}", run.counters.posts_stored);
            println!("  Items dropped: {}", run.counters.items_dropped);
            println!("  Fetch errors: {}", run.counters.fetch_errors);
        }
        None => println!("No runs recorded yet."),
    }
}
