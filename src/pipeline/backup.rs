use crate::pipeline::{DropReason, PostRecord, Stage};
use std::sync::{Mutex, PoisonError};

/// Collects every record for the end-of-run JSON backup
#[derive(Debug, Default)]
pub struct BackupStage {
    buffer: Mutex<Vec<PostRecord>>,
}

impl BackupStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the buffered records, leaving the buffer empty
    pub fn take(&self) -> Vec<PostRecord> {
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Stage for BackupStage {
    type Input = PostRecord;
    type Output = PostRecord;

    fn name(&self) -> &'static str {
        "backup"
    }

    fn process(&self, record: PostRecord) -> Result<PostRecord, DropReason> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(record)
    }
}
