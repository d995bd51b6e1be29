//! SQLite storage implementation

use crate::pipeline::PostRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StorageError, StorageResult};
use crate::storage::{RunCounters, RunRecord, RunStatus, StoredPost, UpsertOutcome};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const POST_COLUMNS: &str = "post_id, url, slug, title, content, excerpt, author_name, \
     author_username, author_profile_url, author_avatar, published_at, updated_at, \
     reading_time, likes_count, comments_count, bookmarks_count, tags, cover_image, \
     scraped_at, source_website, first_seen_at, last_updated_at";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, \
     feed_pages, posts_fetched, posts_stored, items_dropped, fetch_errors";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database file and ensures the schema exists
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn read_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        counters: RunCounters {
            feed_pages: row.get(5)?,
            posts_fetched: row.get(6)?,
            posts_stored: row.get(7)?,
            items_dropped: row.get(8)?,
            fetch_errors: row.get(9)?,
        },
    })
}

/// Raw post row; timestamps and tags are decoded afterwards
struct PostRow {
    record: PostRecord,
    tags: String,
    scraped_at: String,
    first_seen_at: String,
    last_updated_at: String,
}

fn read_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        record: PostRecord {
            post_id: row.get(0)?,
            url: row.get(1)?,
            slug: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            excerpt: row.get(5)?,
            author_name: row.get(6)?,
            author_username: row.get(7)?,
            author_profile_url: row.get(8)?,
            author_avatar: row.get(9)?,
            published_at: row.get(10)?,
            updated_at: row.get(11)?,
            reading_time: row.get(12)?,
            likes_count: row.get(13)?,
            comments_count: row.get(14)?,
            bookmarks_count: row.get(15)?,
            tags: Vec::new(),
            cover_image: row.get(17)?,
            scraped_at: DateTime::<Utc>::MIN_UTC,
            source_website: row.get(19)?,
        },
        tags: row.get(16)?,
        scraped_at: row.get(18)?,
        first_seen_at: row.get(20)?,
        last_updated_at: row.get(21)?,
    })
}

impl PostRow {
    fn decode(self) -> StorageResult<StoredPost> {
        let mut record = self.record;
        record.tags = serde_json::from_str(&self.tags)?;
        record.scraped_at = DateTime::parse_from_rfc3339(&self.scraped_at)
            .map_err(|e| StorageError::Serialization(format!("scraped_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(StoredPost {
            record,
            first_seen_at: self.first_seen_at,
            last_updated_at: self.last_updated_at,
        })
    }
}

impl Store for SqliteStore {
    // ===== Posts =====

    fn upsert(&mut self, record: &PostRecord) -> StorageResult<UpsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let tags = serde_json::to_string(&record.tags)?;

        let tx = self.conn.transaction()?;

        let exists = tx
            .query_row(
                "SELECT 1 FROM posts WHERE post_id = ?1",
                params![record.post_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        tx.execute(
            "INSERT INTO posts (
                post_id, url, slug, title, content, excerpt,
                author_name, author_username, author_profile_url, author_avatar,
                published_at, updated_at, reading_time,
                likes_count, comments_count, bookmarks_count,
                tags, cover_image, scraped_at, source_website,
                first_seen_at, last_updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?21
            ) ON CONFLICT(post_id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                excerpt = excluded.excerpt,
                reading_time = excluded.reading_time,
                likes_count = excluded.likes_count,
                comments_count = excluded.comments_count,
                bookmarks_count = excluded.bookmarks_count,
                tags = excluded.tags,
                cover_image = excluded.cover_image,
                scraped_at = excluded.scraped_at,
                last_updated_at = excluded.last_updated_at",
            params![
                record.post_id,
                record.url,
                record.slug,
                record.title,
                record.content,
                record.excerpt,
                record.author_name,
                record.author_username,
                record.author_profile_url,
                record.author_avatar,
                record.published_at,
                record.updated_at,
                record.reading_time,
                record.likes_count,
                record.comments_count,
                record.bookmarks_count,
                tags,
                record.cover_image,
                record.scraped_at.to_rfc3339(),
                record.source_website,
                now,
            ],
        )?;

        tx.commit()?;

        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn get_post(&self, post_id: &str) -> StorageResult<Option<StoredPost>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM posts WHERE post_id = ?1", POST_COLUMNS),
                params![post_id],
                read_post,
            )
            .optional()?;

        row.map(PostRow::decode).transpose()
    }

    fn count_posts(&self) -> StorageResult<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count)
    }

    fn top_authors(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT author_name, COUNT(*) AS posts FROM posts
             GROUP BY author_name
             ORDER BY posts DESC, author_name ASC
             LIMIT ?1",
        )?;

        let authors = stmt
            .query_map(params![limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(authors)
    }

    // ===== Runs =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counters: &RunCounters,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, feed_pages = ?3,
             posts_fetched = ?4, posts_stored = ?5, items_dropped = ?6, fetch_errors = ?7
             WHERE id = ?8",
            params![
                status.to_db_string(),
                now,
                counters.feed_pages,
                counters.posts_fetched,
                counters.posts_stored,
                counters.items_dropped,
                counters.fetch_errors,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                read_run,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                read_run,
            )
            .optional()?;
        Ok(run)
    }

    fn mark_stale_runs_interrupted(&mut self) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = COALESCE(finished_at, ?2) WHERE status = ?3",
            params![
                RunStatus::Interrupted.to_db_string(),
                now,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(updated)
    }

    fn close(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("PRAGMA optimize;")?;
        Ok(())
    }
}
