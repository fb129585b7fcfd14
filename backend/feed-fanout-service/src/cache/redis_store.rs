//! Redis-backed feed store

use super::store::FeedStore;
use crate::error::{FanoutError, Result};
use async_trait::async_trait;
use connection_watcher::{Pinger, WatchError};
use redis::aio::ConnectionManager;
use redis::Client;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Feed store over a Redis `ConnectionManager`.
///
/// The manager already retries dropped sockets on its own; [`Pinger::reconnect`]
/// replaces it wholesale when the watcher sees pings fail.
pub struct RedisFeedStore {
    client: Client,
    manager: RwLock<ConnectionManager>,
}

impl RedisFeedStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut manager = ConnectionManager::new(client.clone()).await?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut manager)
            .await?;

        info!("Connected to Redis feed store");

        Ok(Self {
            client,
            manager: RwLock::new(manager),
        })
    }

    async fn connection(&self) -> ConnectionManager {
        self.manager.read().await.clone()
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// Build a new connection manager and swap it in
    pub async fn reconnect(&self) -> Result<()> {
        let fresh = ConnectionManager::new(self.client.clone()).await?;
        *self.manager.write().await = fresh;

        info!("Reconnected to Redis feed store");
        Ok(())
    }
}

#[async_trait]
impl FeedStore for RedisFeedStore {
    async fn push_front_unique(&self, key: &str, value: &str, max_len: usize) -> Result<()> {
        let last = i64::try_from(max_len)
            .map_err(|_| FanoutError::Internal(format!("list cap {} out of range", max_len)))?
            - 1;
        let mut conn = self.connection().await;

        redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(key)
            .arg(0)
            .arg(value)
            .ignore()
            .cmd("LPUSH")
            .arg(key)
            .arg(value)
            .ignore()
            .cmd("LTRIM")
            .arg(key)
            .arg(0)
            .arg(last)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn remove_all(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await;

        let removed: i64 = redis::cmd("LREM")
            .arg(key)
            .arg(0)
            .arg(value)
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, removed, "Removed list entries");
        Ok(())
    }

    async fn range_all(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await;

        let values = redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;

        Ok(values)
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        let mut conn = self.connection().await;

        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.connection().await;

        let value = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }
}

#[async_trait]
impl Pinger for RedisFeedStore {
    async fn ping(&self) -> connection_watcher::Result<()> {
        RedisFeedStore::ping(self)
            .await
            .map_err(|e| WatchError::ping(e.to_string()))
    }

    async fn reconnect(&self) -> connection_watcher::Result<()> {
        RedisFeedStore::reconnect(self)
            .await
            .map_err(|e| WatchError::reconnect(e.to_string()))
    }
}
