use crate::pipeline::{DropReason, PostRecord, Stage};
use crate::storage::{SharedStore, UpsertOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::PoisonError;

/// Upserts every record into the store
///
/// Store failures are logged and counted; the record still moves on.
pub struct PersistenceStage {
    store: SharedStore,
    inserted: AtomicU64,
    updated: AtomicU64,
    failed: AtomicU64,
}

impl PersistenceStage {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            inserted: AtomicU64::new(0),
            updated: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// (inserted, updated, failed)
    pub fn counts(&self) -> (u64, u64, u64) {
        (
            self.inserted.load(Ordering::Relaxed),
            self.updated.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}

impl Stage for PersistenceStage {
    type Input = PostRecord;
    type Output = PostRecord;

    fn name(&self) -> &'static str {
        "persistence"
    }

    fn process(&self, record: PostRecord) -> Result<PostRecord, DropReason> {
        let result = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upsert(&record);

        match result {
            Ok(UpsertOutcome::Inserted) => {
                self.inserted.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Stored {} ({})", record.post_id, record.url);
            }
            Ok(UpsertOutcome::Updated) => {
                self.updated.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Updated {} ({})", record.post_id, record.url);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Failed to store {}: {}", record.post_id, e);
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::{ExtractedItem, ValidationStage};
    use crate::storage::{SqliteStore, Store};
    use std::sync::{Arc, Mutex};

    fn record(title: &str) -> PostRecord {
        ValidationStage::new(&PipelineConfig::default())
            .process(ExtractedItem {
                url: "https://dev.to/ada/post".to_string(),
                title: Some(title.to_string()),
                author_name: Some("Ada".to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_insert_then_update() {
        let store: SharedStore = Arc::new(Mutex::new(SqliteStore::new_in_memory().unwrap()));
        let stage = PersistenceStage::new(Arc::clone(&store));

        stage.process(record("First")).unwrap();
        let passed = stage.process(record("Second")).unwrap();
        assert_eq!(passed.title, "Second");
        assert_eq!(stage.counts(), (1, 1, 0));

        let store = store.lock().unwrap();
        assert_eq!(store.count_posts().unwrap(), 1);
        let stored = store.get_post(&passed.post_id).unwrap().unwrap();
        assert_eq!(stored.record.title, "Second");
    }
}
