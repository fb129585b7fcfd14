//! Follower lookups for fan-out

use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;

/// Who should receive an author's posts.
///
/// The count and the list are separate calls; the follower set may change
/// between them.
#[async_trait]
pub trait AudienceRepository: Send + Sync {
    async fn count_followers_of(&self, author_id: &str) -> Result<i64>;

    async fn follower_ids_of(&self, author_id: &str) -> Result<Vec<String>>;
}

/// Audience backed by the `user_friends (user_id, friend_id)` table: a row
/// means `user_id` follows `friend_id`.
#[derive(Clone)]
pub struct PgAudienceRepository {
    pool: PgPool,
}

impl PgAudienceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AudienceRepository for PgAudienceRepository {
    async fn count_followers_of(&self, author_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_friends WHERE friend_id = $1",
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn follower_ids_of(&self, author_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM user_friends WHERE friend_id = $1",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
