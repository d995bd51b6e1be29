use crate::pipeline::{DropReason, PostRecord, Stage};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Drops records whose canonical URL already passed this run
#[derive(Debug, Default)]
pub struct DedupStage {
    seen: Mutex<HashSet<String>>,
}

impl DedupStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Stage for DedupStage {
    type Input = PostRecord;
    type Output = PostRecord;

    fn name(&self) -> &'static str {
        "dedup"
    }

    fn process(&self, record: PostRecord) -> Result<PostRecord, DropReason> {
        let inserted = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.url.clone());

        if inserted {
            Ok(record)
        } else {
            Err(DropReason::Duplicate(record.url))
        }
    }
}
