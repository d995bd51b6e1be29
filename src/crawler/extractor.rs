//! HTML content extraction
//!
//! Turns fetched bodies into feed listings (post links plus an optional
//! next-page link) and into [`ExtractedItem`]s for post pages. Each field is
//! looked up through an ordered list of CSS selectors; the first selector
//! yielding a non-empty value wins.

use crate::pipeline::{ExtractedItem, RawMetrics};
use crate::url::{resolve_link, slug_from_url};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Why a page body could not be turned into a listing or an item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("Empty response body")]
    EmptyBody,

    #[error("Invalid selector '{0}'")]
    Selector(String),
}

/// Links found on a feed page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedListing {
    /// Absolute post URLs in page order
    pub post_urls: Vec<Url>,

    /// Raw `href` of the next-page link, if any
    pub next_page: Option<String>,
}

/// Parses fetched pages
pub trait ContentExtractor: Send + Sync {
    fn extract_feed(&self, url: &Url, body: &str) -> Result<FeedListing, ExtractionError>;

    fn extract_post(&self, url: &Url, body: &str) -> Result<ExtractedItem, ExtractionError>;
}

const POST_LINK_SELECTORS: &[&str] = &[
    "article.crayons-story h2 a",
    "article h3 a",
    ".crayons-story__title a",
    "h2.crayons-story__title a",
];

const NEXT_PAGE_SELECTORS: &[&str] = &[
    r#"a[aria-label="Next page"]"#,
    ".next_page",
    r#"a[rel="next"]"#,
];

const TITLE_SELECTORS: &[&str] = &[
    "h1.crayons-article__header__title",
    "h1[data-article-title]",
    "h1.fs-3xl",
    "h1",
];

const CONTENT_SELECTORS: &[&str] = &[
    "#article-body",
    ".crayons-article__main",
    "[data-article-body]",
    "div.spec__body",
];

const AUTHOR_NAME_SELECTORS: &[&str] = &[
    ".crayons-article__header__meta a[data-user-card-trigger-uid]",
    ".profile-preview-card__content h2",
    "[data-author-name]",
    ".author a",
];

const AUTHOR_USERNAME_SELECTORS: &[&str] = &[
    ".crayons-article__header__meta .crayons-link.fw-bold",
    ".crayons-layout__sidebar-right .crayons-link.crayons-subtitle-2",
];

const AUTHOR_PROFILE_SELECTORS: &[&str] = &[
    ".crayons-article__header__meta a[data-user-card-trigger-uid]",
    ".profile-preview-card__content a",
];

const AUTHOR_AVATAR_SELECTORS: &[&str] = &[
    ".crayons-article__header__meta img",
    ".profile-preview-card img",
];

const EXCERPT_MAX_CHARS: usize = 300;

/// Extractor for dev.to style markup
#[derive(Debug, Clone, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for HtmlExtractor {
    fn extract_feed(&self, url: &Url, body: &str) -> Result<FeedListing, ExtractionError> {
        if body.trim().is_empty() {
            return Err(ExtractionError::EmptyBody);
        }
        let document = Html::parse_document(body);

        let mut post_urls = Vec::new();
        for raw in POST_LINK_SELECTORS {
            let selector = selector(raw)?;
            post_urls.extend(
                document
                    .select(&selector)
                    .filter_map(|a| a.value().attr("href"))
                    .filter_map(|href| resolve_link(href, url)),
            );
            if !post_urls.is_empty() {
                break;
            }
        }

        let next_page = first_attr(&document, NEXT_PAGE_SELECTORS, "href")?;

        Ok(FeedListing {
            post_urls,
            next_page,
        })
    }

    fn extract_post(&self, url: &Url, body: &str) -> Result<ExtractedItem, ExtractionError> {
        if body.trim().is_empty() {
            return Err(ExtractionError::EmptyBody);
        }
        let document = Html::parse_document(body);

        let title = first_text(&document, TITLE_SELECTORS)?;
        let content_element = first_element(&document, CONTENT_SELECTORS)?;
        let content = content_element
            .map(without_scripts)
            .transpose()?
            .map(|html| html.trim().to_string())
            .filter(|html| !html.is_empty());

        let excerpt = match first_attr(&document, &[r#"meta[name="description"]"#], "content")? {
            Some(excerpt) => Some(excerpt),
            None => match first_text(&document, &[".crayons-article__subheader"])? {
                Some(excerpt) => Some(excerpt),
                None => first_paragraph(content_element)?,
            },
        };

        let published_at = first_attr(&document, &["time[datetime]", "[datetime]"], "datetime")?;

        let tags = tags(&document)?;

        let cover_image = first_attr(&document, &[".crayons-article__cover__image img"], "src")?
            .or(first_attr(
                &document,
                &[r#"meta[property="og:image"]"#],
                "content",
            )?)
            .map(|src| absolutize(&src, url));

        Ok(ExtractedItem {
            url: url.to_string(),
            slug: slug_from_url(url),
            title,
            content,
            excerpt,
            author_name: first_text(&document, AUTHOR_NAME_SELECTORS)?,
            author_username: first_text(&document, AUTHOR_USERNAME_SELECTORS)?,
            author_profile_url: first_attr(&document, AUTHOR_PROFILE_SELECTORS, "href")?
                .map(|href| absolutize(&href, url)),
            author_avatar: first_attr(&document, AUTHOR_AVATAR_SELECTORS, "src")?
                .map(|src| absolutize(&src, url)),
            updated_at: published_at.clone(),
            published_at,
            metrics: RawMetrics {
                likes: first_attr(
                    &document,
                    &["[data-reactions-count]"],
                    "data-reactions-count",
                )?,
                comments: match first_attr(
                    &document,
                    &["[data-comments-count]"],
                    "data-comments-count",
                )? {
                    Some(count) => Some(count),
                    None => first_text(&document, &[r##"a[href*="#comments"] span"##])?,
                },
                bookmarks: first_attr(
                    &document,
                    &["[data-bookmarks-count]"],
                    "data-bookmarks-count",
                )?,
                reading_time: reading_time(&document)?,
            },
            tags,
            cover_image,
        })
    }
}

fn selector(raw: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(raw).map_err(|_| ExtractionError::Selector(raw.to_string()))
}

/// Collapses runs of whitespace into single spaces
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<String>())
}

fn first_element<'a>(
    document: &'a Html,
    selectors: &[&str],
) -> Result<Option<ElementRef<'a>>, ExtractionError> {
    for raw in selectors {
        if let Some(element) = document.select(&selector(raw)?).next() {
            return Ok(Some(element));
        }
    }
    Ok(None)
}

fn first_text(document: &Html, selectors: &[&str]) -> Result<Option<String>, ExtractionError> {
    for raw in selectors {
        let selector = selector(raw)?;
        if let Some(text) = document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
        {
            return Ok(Some(text));
        }
    }
    Ok(None)
}

fn first_attr(
    document: &Html,
    selectors: &[&str],
    attr: &str,
) -> Result<Option<String>, ExtractionError> {
    for raw in selectors {
        let selector = selector(raw)?;
        if let Some(value) = document
            .select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
        {
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

fn first_paragraph(content: Option<ElementRef<'_>>) -> Result<Option<String>, ExtractionError> {
    let Some(content) = content else {
        return Ok(None);
    };
    let paragraph = selector("p")?;
    Ok(content
        .select(&paragraph)
        .map(element_text)
        .find(|text| !text.is_empty())
        .map(|text| {
            if text.chars().count() > EXCERPT_MAX_CHARS {
                let truncated: String = text.chars().take(EXCERPT_MAX_CHARS).collect();
                format!("{}...", truncated)
            } else {
                text
            }
        }))
}

fn reading_time(document: &Html) -> Result<Option<String>, ExtractionError> {
    let selector = selector(".crayons-article__header__meta *")?;
    Ok(document
        .select(&selector)
        .map(element_text)
        .filter(|text| text.contains("min read"))
        .min_by_key(|text| text.len()))
}

fn tags(document: &Html) -> Result<Vec<String>, ExtractionError> {
    let selector = selector(".spec__tags .crayons-tag")?;
    Ok(document
        .select(&selector)
        .filter_map(|tag| match tag.value().attr("href") {
            Some(href) => href
                .trim()
                .trim_start_matches("/t/")
                .trim_matches('/')
                .split('/')
                .last()
                .map(str::to_string),
            None => Some(element_text(tag).trim_start_matches('#').to_string()),
        })
        .filter(|tag| !tag.is_empty())
        .collect())
}

fn absolutize(href: &str, base: &Url) -> String {
    resolve_link(href, base)
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}

/// Outer HTML of `element` with its `<script>` and `<style>` subtrees removed
fn without_scripts(element: ElementRef<'_>) -> Result<String, ExtractionError> {
    let mut fragment = Html::parse_fragment(&element.html());
    let doomed: Vec<_> = fragment
        .select(&selector("script, style")?)
        .map(|node| node.id())
        .collect();

    for id in doomed {
        if let Some(mut node) = fragment.tree.get_mut(id) {
            node.detach();
        }
    }

    Ok(fragment.root_element().inner_html())
}
