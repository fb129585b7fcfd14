//! Post fan-out consumer
//!
//! Pulls post change events from the fan-out queue and applies each one to
//! the feed cache of every follower of the author. Authors with a large
//! audience are skipped; their posts are merged in at read time instead.

use crate::cache::FeedCache;
use crate::config::FanoutConfig;
use crate::error::{FanoutError, Result};
use crate::models::{FeedNotification, PostChangeEvent, PostOperation};
use crate::repository::AudienceRepository;
use amqp_broker::{Broker, Delivery, DeliveryStream};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of a successfully handled event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FanoutOutcome {
    Applied {
        operation: PostOperation,
        followers: usize,
    },
    /// Author is at or above the popularity threshold
    SkippedPopularAuthor { followers: i64 },
}

/// Applies one post change event to the followers' feed caches.
#[derive(Clone)]
pub struct FanoutHandler {
    broker: Arc<dyn Broker>,
    audience: Arc<dyn AudienceRepository>,
    cache: FeedCache,
    config: FanoutConfig,
}

impl FanoutHandler {
    pub fn new(
        broker: Arc<dyn Broker>,
        audience: Arc<dyn AudienceRepository>,
        cache: FeedCache,
        config: FanoutConfig,
    ) -> Self {
        Self {
            broker,
            audience,
            cache,
            config,
        }
    }

    pub async fn process(&self, payload: &[u8]) -> Result<FanoutOutcome> {
        let event: PostChangeEvent = serde_json::from_slice(payload)?;
        let operation = event.operation()?;

        let follower_count = self.audience.count_followers_of(&event.author_id).await?;
        if follower_count >= self.config.popularity_threshold {
            debug!(
                author_id = %event.author_id,
                post_id = %event.post_id,
                followers = follower_count,
                "Skipping fan-out for popular author"
            );
            return Ok(FanoutOutcome::SkippedPopularAuthor {
                followers: follower_count,
            });
        }

        let followers = self.audience.follower_ids_of(&event.author_id).await?;

        match operation {
            PostOperation::Add => self.fan_out_add(&event, &followers).await?,
            PostOperation::Remove => {
                for user_id in &followers {
                    self.cache.remove_post_id(user_id, &event.post_id).await?;
                }
            }
        }

        Ok(FanoutOutcome::Applied {
            operation,
            followers: followers.len(),
        })
    }

    async fn fan_out_add(&self, event: &PostChangeEvent, followers: &[String]) -> Result<()> {
        let notification = match &self.config.notify_exchange {
            Some(exchange) => {
                let body = serde_json::to_vec(&FeedNotification::from(event)).map_err(|e| {
                    FanoutError::Internal(format!("Failed to encode feed notification: {}", e))
                })?;
                Some((exchange.as_str(), body))
            }
            None => None,
        };

        for user_id in followers {
            self.cache.add_post_id(user_id, &event.post_id).await?;

            if let Some((exchange, body)) = &notification {
                self.broker.publish(exchange, user_id, body).await?;
            }
        }

        Ok(())
    }

    /// Process, then ack on success or reject on failure. Never fails itself.
    async fn settle(&self, delivery: Delivery) {
        match self.process(delivery.payload()).await {
            Ok(outcome) => {
                debug!(outcome = ?outcome, "Processed post change event");
                if let Err(e) = delivery.ack().await {
                    error!(error = %e, "Failed to ack delivery");
                }
            }
            Err(e) => {
                let requeue = should_requeue(&self.config, &e);
                error!(
                    error = %e,
                    requeue,
                    redelivered = delivery.redelivered(),
                    "Failed to process post change event"
                );
                if let Err(e) = delivery.reject(requeue).await {
                    error!(error = %e, "Failed to reject delivery");
                }
            }
        }
    }

    /// Wait out the backoff and consume again, until it works or shutdown.
    async fn resubscribe(&self, shutdown: &mut watch::Receiver<bool>) -> Option<DeliveryStream> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return None,
                _ = tokio::time::sleep(self.config.resubscribe_backoff) => {}
            }

            match self.broker.consume(&self.config.queue).await {
                Ok(deliveries) => {
                    info!(queue = %self.config.queue, "Resubscribed to fan-out queue");
                    return Some(deliveries);
                }
                Err(e) => {
                    warn!(queue = %self.config.queue, error = %e, "Failed to resubscribe");
                }
            }
        }
    }

    async fn run(self, mut deliveries: DeliveryStream, mut shutdown: watch::Receiver<bool>) {
        loop {
            // Shutdown wins over a ready backlog
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = deliveries.next() => match next {
                    Some(delivery) => self.settle(delivery).await,
                    None => {
                        error!(queue = %self.config.queue, "Delivery stream closed");
                        match self.resubscribe(&mut shutdown).await {
                            Some(fresh) => deliveries = fresh,
                            None => break,
                        }
                    }
                },
            }
        }
    }
}

/// Permanent failures are requeued only when configured to be
fn should_requeue(config: &FanoutConfig, err: &FanoutError) -> bool {
    config.requeue_permanent_failures || !err.is_permanent()
}

/// Owns the background worker that drains the fan-out queue.
pub struct PostFanoutConsumer {
    handler: FanoutHandler,
    shutdown_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl PostFanoutConsumer {
    pub fn new(
        broker: Arc<dyn Broker>,
        audience: Arc<dyn AudienceRepository>,
        cache: FeedCache,
        config: FanoutConfig,
    ) -> Self {
        Self {
            handler: FanoutHandler::new(broker, audience, cache, config),
            shutdown_tx: None,
            handle: None,
        }
    }

    pub fn handler(&self) -> &FanoutHandler {
        &self.handler
    }

    /// Subscribe to the queue and spawn the worker. The initial subscription
    /// failing is reported to the caller; later stream losses are retried.
    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(FanoutError::Internal(
                "post fan-out consumer already started".to_string(),
            ));
        }

        let queue = self.handler.config.queue.clone();
        let deliveries = self.handler.broker.consume(&queue).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        self.handle = Some(tokio::spawn(
            self.handler.clone().run(deliveries, shutdown_rx),
        ));
        self.shutdown_tx = Some(shutdown_tx);

        info!(queue = %queue, "Post fan-out consumer started");
        Ok(())
    }

    /// Signal the worker and wait for it to exit. A delivery being processed
    /// is finished first.
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Post fan-out worker panicked");
            }
            info!("Post fan-out consumer stopped");
        }
    }
}
