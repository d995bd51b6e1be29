use std::fmt;
use url::Url;

/// Index of a feed inside the frontier's feed arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedId(pub usize);

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feed#{}", self.0)
    }
}

/// Whether a feed can still produce feed-page tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedStatus {
    /// A feed page is queued or in flight
    Active,

    /// No further feed pages will be requested
    Exhausted,
}

impl FeedStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Pagination progress of one starting feed
#[derive(Debug, Clone)]
pub struct FeedState {
    pub id: FeedId,

    /// The URL the feed was seeded with
    pub base_url: Url,

    /// URL of the page currently queued or being fetched
    pub current_url: Url,

    /// 1-based index of `current_url`
    pub page_index: u32,

    pub status: FeedStatus,
}

impl FeedState {
    /// Creates a feed positioned on its first page
    pub fn new(id: FeedId, base_url: Url) -> Self {
        Self {
            id,
            current_url: base_url.clone(),
            base_url,
            page_index: 1,
            status: FeedStatus::Active,
        }
    }

    /// Moves the feed to its next page
    pub fn advance(&mut self, next_url: Url) {
        self.current_url = next_url;
        self.page_index += 1;
    }

    pub fn exhaust(&mut self) {
        self.status = FeedStatus::Exhausted;
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> FeedState {
        FeedState::new(FeedId(0), Url::parse("https://dev.to/latest").unwrap())
    }

    #[test]
    fn test_new_feed_starts_on_page_one() {
        let state = feed();
        assert_eq!(state.page_index, 1);
        assert_eq!(state.current_url, state.base_url);
        assert!(state.is_active());
    }

    #[test]
    fn test_advance() {
        let mut state = feed();
        let next = Url::parse("https://dev.to/latest?page=2").unwrap();
        state.advance(next.clone());

        assert_eq!(state.page_index, 2);
        assert_eq!(state.current_url, next);
        assert_eq!(state.base_url.as_str(), "https://dev.to/latest");
    }

    #[test]
    fn test_exhaust() {
        let mut state = feed();
        state.exhaust();
        assert_eq!(state.status, FeedStatus::Exhausted);
        assert!(!state.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(FeedId(3).to_string(), "feed#3");
        assert_eq!(FeedStatus::Exhausted.to_string(), "exhausted");
    }
}
