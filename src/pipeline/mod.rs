//! Item pipeline
//!
//! Every extracted post flows through four stages in a fixed order:
//! validation, dedup, persistence and backup. A stage either passes the
//! item on (possibly transformed) or drops it with a [`DropReason`]; a
//! dropped item never reaches a later stage.

mod backup;
mod dedup;
mod item;
mod persistence;
mod validation;

pub use backup::BackupStage;
pub use dedup::DedupStage;
pub use item::{ExtractedItem, PostRecord, RawMetrics};
pub use persistence::PersistenceStage;
pub use validation::{coerce_count, make_post_id, ValidationStage};

use crate::config::PipelineConfig;
use crate::output::{BackupSink, OutputError};
use crate::storage::SharedStore;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Why a stage dropped an item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("duplicate of {0}")]
    Duplicate(String),
}

/// One step of the item pipeline
pub trait Stage: Send + Sync {
    type Input;
    type Output;

    fn name(&self) -> &'static str;

    fn process(&self, input: Self::Input) -> Result<Self::Output, DropReason>;
}

/// Running totals for one pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub exported: u64,
    pub dropped_missing_field: u64,
    pub dropped_invalid_url: u64,
    pub dropped_duplicate: u64,
    pub inserted: u64,
    pub updated: u64,
    pub store_errors: u64,
}

impl PipelineStats {
    pub fn dropped(&self) -> u64 {
        self.dropped_missing_field + self.dropped_invalid_url + self.dropped_duplicate
    }

    fn record_drop(&mut self, reason: &DropReason) {
        match reason {
            DropReason::MissingField(_) => self.dropped_missing_field += 1,
            DropReason::InvalidUrl(_) => self.dropped_invalid_url += 1,
            DropReason::Duplicate(_) => self.dropped_duplicate += 1,
        }
    }
}

/// Result of closing a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub stats: PipelineStats,
    pub backup_path: Option<PathBuf>,
}

/// The four-stage item pipeline
///
/// Items are processed one at a time; the coordinator feeds the pipeline
/// from a single lane so stage order holds for every item.
pub struct Pipeline {
    validation: ValidationStage,
    dedup: DedupStage,
    persistence: PersistenceStage,
    backup: BackupStage,
    sink: Option<BackupSink>,
    stats: Mutex<PipelineStats>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, store: SharedStore, sink: Option<BackupSink>) -> Self {
        Self {
            validation: ValidationStage::new(config),
            dedup: DedupStage::new(),
            persistence: PersistenceStage::new(store),
            backup: BackupStage::new(),
            sink,
            stats: Mutex::new(PipelineStats::default()),
        }
    }

    /// Runs one item through every stage
    ///
    /// Returns the post ID of the exported record.
    pub fn process(&self, item: ExtractedItem) -> Result<String, DropReason> {
        self.update_stats(|s| s.received += 1);
        let source = item.url.clone();

        let result = run_stage(&self.validation, item)
            .and_then(|record| run_stage(&self.dedup, record))
            .and_then(|record| run_stage(&self.persistence, record))
            .and_then(|record| run_stage(&self.backup, record));

        match result {
            Ok(record) => {
                self.update_stats(|s| s.exported += 1);
                Ok(record.post_id)
            }
            Err(reason) => {
                tracing::debug!("Dropped {}: {}", source, reason);
                self.update_stats(|s| s.record_drop(&reason));
                Err(reason)
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        let (inserted, updated, store_errors) = self.persistence.counts();
        let mut stats = *self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.inserted = inserted;
        stats.updated = updated;
        stats.store_errors = store_errors;
        stats
    }

    /// Writes the backup file, if any, and returns the final totals
    pub fn finish(self) -> Result<PipelineSummary, OutputError> {
        let stats = self.stats();
        let records = self.backup.take();

        let backup_path = match self.sink {
            Some(sink) => Some(sink.write(&records)?),
            None => None,
        };

        tracing::info!(
            "Pipeline closed: {} received, {} exported, {} dropped ({} inserted, {} updated)",
            stats.received,
            stats.exported,
            stats.dropped(),
            stats.inserted,
            stats.updated
        );

        Ok(PipelineSummary { stats, backup_path })
    }

    fn update_stats(&self, f: impl FnOnce(&mut PipelineStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

fn run_stage<S: Stage>(stage: &S, input: S::Input) -> Result<S::Output, DropReason> {
    stage.process(input).map_err(|reason| {
        tracing::trace!("Stage {} dropped item: {}", stage.name(), reason);
        reason
    })
}
