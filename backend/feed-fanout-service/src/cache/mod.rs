//! Per-user feed cache
//!
//! Every user owns two keys:
//! - `postfeed:user_{id}` → list of post IDs, newest first, capped
//! - `postfeed:last_retrieved_at:user_{id}` → Unix time in milliseconds of the
//!   last feed refresh
//!
//! The storage backend is a [`FeedStore`]; Redis in production, memory in tests.

mod memory_store;
mod redis_store;
mod store;

pub use memory_store::MemoryFeedStore;
pub use redis_store::RedisFeedStore;
pub use store::FeedStore;

use crate::error::{FanoutError, Result};
use std::sync::Arc;

/// Default max cached post IDs per user
pub const DEFAULT_MAX_FEED_LEN: usize = 1000;

const POST_FEED_PREFIX: &str = "postfeed:user_";
const LAST_RETRIEVED_AT_PREFIX: &str = "postfeed:last_retrieved_at:user_";

pub fn feed_key(user_id: &str) -> String {
    format!("{}{}", POST_FEED_PREFIX, user_id)
}

pub fn last_retrieved_at_key(user_id: &str) -> String {
    format!("{}{}", LAST_RETRIEVED_AT_PREFIX, user_id)
}

/// Bounded per-user list of post IDs plus its freshness timestamp
#[derive(Clone)]
pub struct FeedCache {
    store: Arc<dyn FeedStore>,
    max_len: usize,
}

impl FeedCache {
    /// `max_len` must be at least 1
    pub fn new(store: Arc<dyn FeedStore>, max_len: usize) -> Result<Self> {
        if max_len == 0 {
            return Err(FanoutError::Config(
                "feed cache max length must be greater than 0".to_string(),
            ));
        }
        Ok(Self { store, max_len })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Put `post_id` at the head of the user's feed. Re-adding an ID moves it
    /// to the head instead of duplicating it; the oldest IDs beyond the cap
    /// are dropped.
    pub async fn add_post_id(&self, user_id: &str, post_id: &str) -> Result<()> {
        self.store
            .push_front_unique(&feed_key(user_id), post_id, self.max_len)
            .await
    }

    /// Remove every occurrence of `post_id`
    pub async fn remove_post_id(&self, user_id: &str, post_id: &str) -> Result<()> {
        self.store.remove_all(&feed_key(user_id), post_id).await
    }

    /// Cached IDs, newest first. A user with no feed yields an empty list.
    pub async fn get_post_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.store.range_all(&feed_key(user_id)).await
    }

    pub async fn set_last_retrieved_at(&self, user_id: &str, timestamp_millis: i64) -> Result<()> {
        self.store
            .set_i64(&last_retrieved_at_key(user_id), timestamp_millis)
            .await
    }

    /// Last refresh time in milliseconds, `0` if never set
    pub async fn get_last_retrieved_at(&self, user_id: &str) -> Result<i64> {
        Ok(self
            .store
            .get_i64(&last_retrieved_at_key(user_id))
            .await?
            .unwrap_or(0))
    }
}
