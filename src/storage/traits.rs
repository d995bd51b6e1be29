//! Storage traits and error types

use crate::pipeline::PostRecord;
use crate::storage::{RunCounters, RunRecord, RunStatus, StoredPost, UpsertOutcome};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Store shared between the pipeline and the coordinator
pub type SharedStore = Arc<Mutex<dyn Store>>;

/// Persistence backend for posts and runs
///
/// Every method is a single atomic operation.
pub trait Store: Send {
    // ===== Posts =====

    /// Inserts the record, or replaces the mutable fields of the record with
    /// the same `post_id`
    ///
    /// The first-seen timestamp of an existing record is kept.
    fn upsert(&mut self, record: &PostRecord) -> StorageResult<UpsertOutcome>;

    fn get_post(&self, post_id: &str) -> StorageResult<Option<StoredPost>>;

    fn count_posts(&self) -> StorageResult<u64>;

    /// Authors with the most posts, most prolific first
    fn top_authors(&self, limit: usize) -> StorageResult<Vec<(String, u64)>>;

    // ===== Runs =====

    /// Records the start of a run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> StorageResult<()>;

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks runs still flagged `running` as `interrupted`
    ///
    /// Returns the number of runs updated.
    fn mark_stale_runs_interrupted(&mut self) -> StorageResult<usize>;

    /// Flushes pending work before the process exits
    fn close(&mut self) -> StorageResult<()>;
}
