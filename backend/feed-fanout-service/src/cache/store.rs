use crate::error::Result;
use async_trait::async_trait;

/// Key-value backend with list operations.
///
/// Lists are ordered newest first. Implementations must apply each call
/// atomically per key.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Remove every occurrence of `value`, push it to the head, then keep at
    /// most `max_len` entries. `max_len` is at least 1.
    async fn push_front_unique(&self, key: &str, value: &str, max_len: usize) -> Result<()>;

    /// Remove every occurrence of `value`
    async fn remove_all(&self, key: &str, value: &str) -> Result<()>;

    /// Whole list, head first; empty when the key is missing
    async fn range_all(&self, key: &str) -> Result<Vec<String>>;

    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;
}
