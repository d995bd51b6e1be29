//! Robots.txt rules, evaluated with the robotstxt crate

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content; `None` allows everything
    content: Option<String>,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// Permissive policy used when robots.txt is missing or unreachable
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Checks if a URL is allowed for the given user agent product token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.content.as_deref() {
            None | Some("") => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("https://dev.to/any/path", "postcrawl"));
    }

    #[test]
    fn test_disallow_all() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("https://dev.to/", "postcrawl"));
        assert!(!robots.is_allowed("https://dev.to/ben/post", "postcrawl"));
    }

    #[test]
    fn test_disallow_prefix() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /search");
        assert!(robots.is_allowed("https://dev.to/latest", "postcrawl"));
        assert!(!robots.is_allowed("https://dev.to/search?q=rust", "postcrawl"));
    }

    #[test]
    fn test_agent_specific_group() {
        let content = "User-agent: postcrawl\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(!robots.is_allowed("https://dev.to/page", "postcrawl"));
        assert!(robots.is_allowed("https://dev.to/page", "otherbot"));
    }

    #[test]
    fn test_garbage_allows() {
        let robots = ParsedRobots::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed("https://dev.to/page", "postcrawl"));
    }

    #[test]
    fn test_empty_allows() {
        let robots = ParsedRobots::from_content("");
        assert!(robots.is_allowed("https://dev.to/page", "postcrawl"));
    }
}
