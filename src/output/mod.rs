//! Output module for run artifacts and reports
//!
//! This module handles:
//! - Writing the JSON backup of every record that passed the pipeline
//! - Loading and printing store statistics

mod backup;
pub mod stats;

pub use backup::{backup_file_name, BackupSink};
pub use stats::{load_statistics, print_statistics, StoreStatistics};

use thiserror::Error;

/// Errors raised while writing output files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}
