use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement figures exactly as found on the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMetrics {
    pub likes: Option<String>,
    pub comments: Option<String>,
    pub bookmarks: Option<String>,
    pub reading_time: Option<String>,
}

/// A post as produced by the content extractor, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedItem {
    pub url: String,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub author_name: Option<String>,
    pub author_username: Option<String>,
    pub author_profile_url: Option<String>,
    pub author_avatar: Option<String>,
    pub published_at: Option<String>,
    pub updated_at: Option<String>,
    pub metrics: RawMetrics,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
}

/// A validated post, ready to be stored and exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub post_id: String,

    /// Canonical URL
    pub url: String,
    pub slug: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub author_name: String,
    pub author_username: Option<String>,
    pub author_profile_url: Option<String>,
    pub author_avatar: Option<String>,
    pub published_at: Option<String>,
    pub updated_at: Option<String>,
    pub reading_time: u64,
    pub likes_count: u64,
    pub comments_count: u64,
    pub bookmarks_count: u64,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub source_website: String,
}
