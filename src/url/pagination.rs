use url::Url;

/// Query parameter used for synthesized pagination
pub const PAGE_PARAM: &str = "page";

/// Builds the URL of page `page` of a feed from its base URL
///
/// Any existing `page` parameter is replaced; other query parameters are
/// kept in their original order.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use postcrawl::url::synthesize_page_url;
///
/// let base = Url::parse("https://dev.to/top/week").unwrap();
/// assert_eq!(
///     synthesize_page_url(&base, 3).as_str(),
///     "https://dev.to/top/week?page=3"
/// );
/// ```
pub fn synthesize_page_url(base: &Url, page: u32) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != PAGE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        pairs.extend_pairs(kept);
        pairs.append_pair(PAGE_PARAM, &page.to_string());
    }
    url
}

/// Resolves an `href` against the page it was found on
///
/// Returns `None` for empty hrefs, same-page anchors, non-navigational
/// schemes (`javascript:`, `mailto:`, `tel:`, `data:`) and anything that
/// does not resolve to an http(s) URL.
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute),
        _ => None,
    }
}

/// Returns the last non-empty path segment of a URL
pub fn slug_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}
