use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use postcrawl::url::extract_domain;
///
/// let url = Url::parse("https://DEV.to/ben/some-post").unwrap();
/// assert_eq!(extract_domain(&url), Some("dev.to".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a domain matches a pattern
///
/// `"dev.to"` matches only `dev.to`; `"*.dev.to"` matches `dev.to` itself
/// and any subdomain of it. Both sides are expected to be lowercase.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => candidate == base || candidate.ends_with(&format!(".{}", base)),
        None => candidate == pattern,
    }
}

/// Returns true if the URL's host is covered by one of the allowed patterns
///
/// An empty pattern list allows every host.
pub fn is_allowed_domain(url: &Url, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    match extract_domain(url) {
        Some(domain) => allowed
            .iter()
            .any(|pattern| matches_wildcard(&pattern.to_lowercase(), &domain)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("http://127.0.0.1:8080/feed").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_exact_pattern() {
        assert!(matches_wildcard("dev.to", "dev.to"));
        assert!(!matches_wildcard("dev.to", "blog.dev.to"));
        assert!(!matches_wildcard("dev.to", "notdev.to"));
    }

    #[test]
    fn test_wildcard_pattern() {
        assert!(matches_wildcard("*.dev.to", "dev.to"));
        assert!(matches_wildcard("*.dev.to", "blog.dev.to"));
        assert!(matches_wildcard("*.dev.to", "a.b.dev.to"));
        assert!(!matches_wildcard("*.dev.to", "mydev.to"));
        assert!(!matches_wildcard("*.dev.to", "dev.to.evil.com"));
    }

    #[test]
    fn test_empty_allow_list_allows_all() {
        let url = Url::parse("https://anything.example/post").unwrap();
        assert!(is_allowed_domain(&url, &[]));
    }

    #[test]
    fn test_allow_list_filters_offsite() {
        let allowed = vec!["dev.to".to_string()];
        let onsite = Url::parse("https://dev.to/ben/post").unwrap();
        let offsite = Url::parse("https://medium.com/@ben/post").unwrap();

        assert!(is_allowed_domain(&onsite, &allowed));
        assert!(!is_allowed_domain(&offsite, &allowed));
    }

    #[test]
    fn test_allow_list_pattern_case_insensitive() {
        let allowed = vec!["DEV.to".to_string()];
        let url = Url::parse("https://dev.to/ben/post").unwrap();
        assert!(is_allowed_domain(&url, &allowed));
    }
}
