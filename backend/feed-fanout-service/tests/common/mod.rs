//! Test doubles for the fan-out pipeline
#![allow(dead_code)]

use amqp_broker::{Acknowledger, Broker, BrokerError, Delivery, DeliveryStream};
use async_trait::async_trait;
use feed_fanout_service::config::FanoutConfig;
use feed_fanout_service::{
    AudienceRepository, FanoutError, FeedCache, FeedStore, MemoryFeedStore, PostFanoutConsumer,
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Acked(Vec<u8>),
    Rejected { payload: Vec<u8>, requeue: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Vec<u8>,
}

struct RecordingAcker {
    payload: Vec<u8>,
    settlements: Arc<Mutex<Vec<Settlement>>>,
}

#[async_trait]
impl Acknowledger for RecordingAcker {
    async fn ack(&self) -> amqp_broker::Result<()> {
        self.settlements
            .lock()
            .push(Settlement::Acked(self.payload.clone()));
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> amqp_broker::Result<()> {
        self.settlements.lock().push(Settlement::Rejected {
            payload: self.payload.clone(),
            requeue,
        });
        Ok(())
    }
}

/// In-memory broker. Publishing to the default exchange with a queue name as
/// routing key delivers to the current subscriber of that queue; everything
/// published is also recorded.
#[derive(Default)]
pub struct FakeBroker {
    subscribers: Mutex<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
    published: Mutex<Vec<Published>>,
    settlements: Arc<Mutex<Vec<Settlement>>>,
    consume_calls: AtomicUsize,
    fail_consume: AtomicBool,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// End the current delivery stream of `queue`
    pub fn close_stream(&self, queue: &str) {
        self.subscribers.lock().remove(queue);
    }

    pub fn set_fail_consume(&self, fail: bool) {
        self.fail_consume.store(fail, Ordering::SeqCst);
    }

    pub fn consume_calls(&self) -> usize {
        self.consume_calls.load(Ordering::SeqCst)
    }

    pub fn settlements(&self) -> Vec<Settlement> {
        self.settlements.lock().clone()
    }

    /// Messages published to a non-default exchange
    pub fn notifications(&self) -> Vec<Published> {
        self.published
            .lock()
            .iter()
            .filter(|p| !p.exchange.is_empty())
            .cloned()
            .collect()
    }

    pub async fn wait_for_settlements(&self, count: usize) -> Vec<Settlement> {
        wait_until(|| self.settlements.lock().len() >= count).await;
        self.settlements()
    }

    pub async fn wait_for_consume_calls(&self, count: usize) {
        wait_until(|| self.consume_calls() >= count).await;
    }

    pub async fn wait_for_subscriber(&self, queue: &str) {
        wait_until(|| self.subscribers.lock().contains_key(queue)).await;
    }

    /// Enqueue raw bytes on `queue`
    pub async fn publish_raw(&self, queue: &str, payload: &[u8]) {
        Broker::publish(self, "", queue, payload)
            .await
            .expect("fake publish never fails");
    }
}

#[async_trait]
impl Broker for FakeBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> amqp_broker::Result<()> {
        self.published.lock().push(Published {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
        });

        if exchange.is_empty() {
            if let Some(subscriber) = self.subscribers.lock().get(routing_key) {
                let acker = RecordingAcker {
                    payload: payload.to_vec(),
                    settlements: self.settlements.clone(),
                };
                let _ = subscriber.send(Delivery::new(payload.to_vec(), false, Box::new(acker)));
            }
        }
        Ok(())
    }

    async fn consume(&self, queue: &str) -> amqp_broker::Result<DeliveryStream> {
        self.consume_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_consume.load(Ordering::SeqCst) {
            return Err(BrokerError::NotConnected);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(queue.to_string(), tx);

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (delivery, rx))
        })
        .boxed())
    }
}

/// Follower graph held in memory
#[derive(Default)]
pub struct FakeAudience {
    followers: Mutex<HashMap<String, Vec<String>>>,
    fail: AtomicBool,
}

impl FakeAudience {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_followers(&self, author_id: &str, followers: &[&str]) {
        self.followers.lock().insert(
            author_id.to_string(),
            followers.iter().map(|f| f.to_string()).collect(),
        );
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> feed_fanout_service::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FanoutError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl AudienceRepository for FakeAudience {
    async fn count_followers_of(&self, author_id: &str) -> feed_fanout_service::Result<i64> {
        self.check()?;
        Ok(self
            .followers
            .lock()
            .get(author_id)
            .map_or(0, |f| f.len() as i64))
    }

    async fn follower_ids_of(&self, author_id: &str) -> feed_fanout_service::Result<Vec<String>> {
        self.check()?;
        Ok(self
            .followers
            .lock()
            .get(author_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Store whose every call fails like an unreachable Redis
pub struct UnavailableStore;

#[async_trait]
impl FeedStore for UnavailableStore {
    async fn push_front_unique(&self, _: &str, _: &str, _: usize) -> feed_fanout_service::Result<()> {
        Err(unavailable())
    }

    async fn remove_all(&self, _: &str, _: &str) -> feed_fanout_service::Result<()> {
        Err(unavailable())
    }

    async fn range_all(&self, _: &str) -> feed_fanout_service::Result<Vec<String>> {
        Err(unavailable())
    }

    async fn set_i64(&self, _: &str, _: i64) -> feed_fanout_service::Result<()> {
        Err(unavailable())
    }

    async fn get_i64(&self, _: &str) -> feed_fanout_service::Result<Option<i64>> {
        Err(unavailable())
    }
}

fn unavailable() -> FanoutError {
    FanoutError::Redis(redis::RedisError::from((
        redis::ErrorKind::IoError,
        "connection refused",
    )))
}

pub fn test_config() -> FanoutConfig {
    FanoutConfig {
        resubscribe_backoff: Duration::from_millis(10),
        ..FanoutConfig::default()
    }
}

pub struct Pipeline {
    pub broker: Arc<FakeBroker>,
    pub audience: Arc<FakeAudience>,
    pub cache: FeedCache,
    pub consumer: PostFanoutConsumer,
}

pub fn pipeline(config: FanoutConfig) -> Pipeline {
    pipeline_with_store(config, Arc::new(MemoryFeedStore::new()))
}

pub fn pipeline_with_store(config: FanoutConfig, store: Arc<dyn FeedStore>) -> Pipeline {
    let broker = FakeBroker::new();
    let audience = FakeAudience::new();
    let cache = FeedCache::new(store, 1000).expect("non-zero cap");
    let consumer = PostFanoutConsumer::new(broker.clone(), audience.clone(), cache.clone(), config);

    Pipeline {
        broker,
        audience,
        cache,
        consumer,
    }
}

async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
