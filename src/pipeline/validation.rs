use crate::config::PipelineConfig;
use crate::pipeline::{DropReason, ExtractedItem, PostRecord, Stage};
use crate::url::canonicalize_url;
use chrono::Utc;
use sha2::{Digest, Sha256};
use url::Url;

/// Number of hex characters of the URL digest kept in a post identifier
const POST_ID_HEX_LEN: usize = 12;

/// Builds `<prefix>_<first 12 hex chars of SHA-256(canonical URL)>`
pub fn make_post_id(prefix: &str, canonical_url: &Url) -> String {
    let digest = hex::encode(Sha256::digest(canonical_url.as_str().as_bytes()));
    format!("{}_{}", prefix, &digest[..POST_ID_HEX_LEN])
}

/// Reads the first run of ASCII digits in `raw`
///
/// Absent, digit-free, negative or overflowing values count as zero.
pub fn coerce_count(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };
    let Some(start) = raw.find(|c: char| c.is_ascii_digit()) else {
        return 0;
    };
    if raw[..start].trim_end().ends_with('-') {
        return 0;
    }

    let digits: String = raw[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Returns the trimmed value, or `None` if it is absent or blank
fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turns extracted items into records, dropping items without a title,
/// URL or author
#[derive(Debug, Clone)]
pub struct ValidationStage {
    id_prefix: String,
    source_website: String,
}

impl ValidationStage {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            id_prefix: config.id_prefix.clone(),
            source_website: config.source_website.clone(),
        }
    }
}

impl Stage for ValidationStage {
    type Input = ExtractedItem;
    type Output = PostRecord;

    fn name(&self) -> &'static str {
        "validation"
    }

    fn process(&self, item: ExtractedItem) -> Result<PostRecord, DropReason> {
        let title = required(item.title).ok_or(DropReason::MissingField("title"))?;

        if item.url.trim().is_empty() {
            return Err(DropReason::MissingField("url"));
        }

        let author_name = required(item.author_name).ok_or(DropReason::MissingField("author_name"))?;

        let url = canonicalize_url(&item.url).map_err(|_| DropReason::InvalidUrl(item.url.clone()))?;

        Ok(PostRecord {
            post_id: make_post_id(&self.id_prefix, &url),
            url: url.to_string(),
            slug: item.slug,
            title,
            content: item.content,
            excerpt: item.excerpt,
            author_name,
            author_username: item.author_username,
            author_profile_url: item.author_profile_url,
            author_avatar: item.author_avatar,
            published_at: item.published_at,
            updated_at: item.updated_at,
            reading_time: coerce_count(item.metrics.reading_time.as_deref()),
            likes_count: coerce_count(item.metrics.likes.as_deref()),
            comments_count: coerce_count(item.metrics.comments.as_deref()),
            bookmarks_count: coerce_count(item.metrics.bookmarks.as_deref()),
            tags: item.tags,
            cover_image: item.cover_image,
            scraped_at: Utc::now(),
            source_website: self.source_website.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RawMetrics;

    fn stage() -> ValidationStage {
        ValidationStage::new(&PipelineConfig::default())
    }

    fn item() -> ExtractedItem {
        ExtractedItem {
            url: "https://dev.to/ben/hello-rust".to_string(),
            title: Some("  Hello Rust ".to_string()),
            author_name: Some("Ben".to_string()),
            metrics: RawMetrics {
                likes: Some("42 reactions".to_string()),
                comments: Some("seven".to_string()),
                bookmarks: None,
                reading_time: Some("5 min read".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_coerce_count() {
        assert_eq!(coerce_count(Some("42 reactions")), 42);
        assert_eq!(coerce_count(Some("42")), 42);
        assert_eq!(coerce_count(Some("about 7 comments")), 7);
        assert_eq!(coerce_count(Some("none")), 0);
        assert_eq!(coerce_count(Some("")), 0);
        assert_eq!(coerce_count(None), 0);
        assert_eq!(coerce_count(Some("-5")), 0);
        assert_eq!(coerce_count(Some("99999999999999999999999")), 0);
    }

    #[test]
    fn test_valid_item_becomes_record() {
        let record = stage().process(item()).unwrap();

        assert_eq!(record.title, "Hello Rust");
        assert_eq!(record.url, "https://dev.to/ben/hello-rust");
        assert_eq!(record.likes_count, 42);
        assert_eq!(record.comments_count, 0);
        assert_eq!(record.bookmarks_count, 0);
        assert_eq!(record.reading_time, 5);
        assert_eq!(record.source_website, "dev.to");
        assert!(record.post_id.starts_with("devto_"));
        assert_eq!(record.post_id.len(), "devto_".len() + 12);
    }

    #[test]
    fn test_post_id_uses_canonical_url() {
        let mut other = item();
        other.url = "https://DEV.to/ben/hello-rust/?utm_source=x#top".to_string();

        let a = stage().process(item()).unwrap();
        let b = stage().process(other).unwrap();
        assert_eq!(a.post_id, b.post_id);
        assert_eq!(a.url, b.url);
    }

    #[test]
    fn test_missing_title_dropped() {
        let mut missing = item();
        missing.title = Some("   ".to_string());
        assert_eq!(
            stage().process(missing).unwrap_err(),
            DropReason::MissingField("title")
        );
    }

    #[test]
    fn test_missing_url_dropped() {
        let mut missing = item();
        missing.url = String::new();
        assert_eq!(
            stage().process(missing).unwrap_err(),
            DropReason::MissingField("url")
        );
    }

    #[test]
    fn test_missing_author_dropped() {
        let mut missing = item();
        missing.author_name = None;
        assert_eq!(
            stage().process(missing).unwrap_err(),
            DropReason::MissingField("author_name")
        );
    }

    #[test]
    fn test_invalid_scheme_dropped() {
        let mut bad = item();
        bad.url = "ftp://dev.to/ben/hello-rust".to_string();
        assert!(matches!(
            stage().process(bad).unwrap_err(),
            DropReason::InvalidUrl(_)
        ));
    }

    #[test]
    fn test_custom_prefix() {
        let stage = ValidationStage::new(&PipelineConfig {
            source_website: "example.blog".to_string(),
            id_prefix: "blog".to_string(),
        });
        let record = stage.process(item()).unwrap();
        assert!(record.post_id.starts_with("blog_"));
        assert_eq!(record.source_website, "example.blog");
    }
}
