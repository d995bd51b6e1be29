//! JSON backup export
//!
//! The backup file is created when the run starts, so an unwritable backup
//! directory fails the run before any request is made, and is filled once
//! when the pipeline shuts down.

use crate::output::OutputError;
use crate::pipeline::PostRecord;
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Builds `<prefix>_backup_<YYYYmmdd_HHMMSS>.json`
pub fn backup_file_name(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_backup_{}.json", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// An open backup file waiting for the final record list
#[derive(Debug)]
pub struct BackupSink {
    path: PathBuf,
    file: File,
}

impl BackupSink {
    /// Creates the backup directory if needed and opens a timestamped file in it
    pub fn open(dir: &Path, prefix: &str) -> Result<Self, OutputError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(backup_file_name(prefix, Local::now()));
        Self::create(path)
    }

    /// Opens (truncating) a backup file at an exact path
    pub fn create(path: PathBuf) -> Result<Self, OutputError> {
        let file = File::create(&path)?;
        tracing::debug!("Opened backup file {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes all records as a pretty-printed JSON array and closes the file
    pub fn write(self, records: &[PostRecord]) -> Result<PathBuf, OutputError> {
        let mut writer = BufWriter::new(self.file);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::info!(
            "Exported {} record(s) to {}",
            records.len(),
            self.path.display()
        );
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(post_id: &str) -> PostRecord {
        PostRecord {
            post_id: post_id.to_string(),
            url: format!("https://dev.to/ben/{}", post_id),
            slug: None,
            title: "Title".to_string(),
            content: None,
            excerpt: None,
            author_name: "Ben".to_string(),
            author_username: None,
            author_profile_url: None,
            author_avatar: None,
            published_at: None,
            updated_at: None,
            reading_time: 0,
            likes_count: 3,
            comments_count: 0,
            bookmarks_count: 0,
            tags: vec![],
            cover_image: None,
            scraped_at: Utc::now(),
            source_website: "dev.to".to_string(),
        }
    }

    #[test]
    fn test_file_name_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(
            backup_file_name("devto", at),
            "devto_backup_20240301_090507.json"
        );
    }

    #[test]
    fn test_open_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let backup_dir = dir.path().join("data");

        let sink = BackupSink::open(&backup_dir, "devto").unwrap();

        assert!(sink.path().exists());
        assert!(sink.path().starts_with(&backup_dir));
        let name = sink.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("devto_backup_"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_write_pretty_array() {
        let dir = tempfile::tempdir().unwrap();
        let sink = BackupSink::create(dir.path().join("backup.json")).unwrap();

        let path = sink.write(&[record("a"), record("b")]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n"));
        let parsed: Vec<PostRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].post_id, "b");
    }

    #[test]
    fn test_write_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = BackupSink::create(dir.path().join("backup.json")).unwrap();
        let path = sink.write(&[]).unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_open_unwritable_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        assert!(BackupSink::open(&blocker, "devto").is_err());
    }
}
