//! State module for tracking feed pagination
//!
//! Each starting feed gets one `FeedState`, owned by the frontier and
//! addressed by its `FeedId`.

mod feed_state;

pub use feed_state::{FeedId, FeedState, FeedStatus};
