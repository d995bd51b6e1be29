//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    feed_pages INTEGER NOT NULL DEFAULT 0,
    posts_fetched INTEGER NOT NULL DEFAULT 0,
    posts_stored INTEGER NOT NULL DEFAULT 0,
    items_dropped INTEGER NOT NULL DEFAULT 0,
    fetch_errors INTEGER NOT NULL DEFAULT 0
);

-- One row per post, keyed by the derived post identifier
CREATE TABLE IF NOT EXISTS posts (
    post_id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    slug TEXT,
    title TEXT NOT NULL,
    content TEXT,
    excerpt TEXT,
    author_name TEXT NOT NULL,
    author_username TEXT,
    author_profile_url TEXT,
    author_avatar TEXT,
    published_at TEXT,
    updated_at TEXT,
    reading_time INTEGER NOT NULL DEFAULT 0,
    likes_count INTEGER NOT NULL DEFAULT 0,
    comments_count INTEGER NOT NULL DEFAULT 0,
    bookmarks_count INTEGER NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT '[]',
    cover_image TEXT,
    scraped_at TEXT NOT NULL,
    source_website TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_name);
CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(published_at);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
