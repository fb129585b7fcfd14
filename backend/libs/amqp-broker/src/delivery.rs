//! Consumed messages and their settlement

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Remove the message from the queue
    async fn ack(&self) -> Result<()>;

    /// Hand the message back; with `requeue = false` the broker drops it or
    /// routes it to the queue's dead-letter exchange
    async fn reject(&self, requeue: bool) -> Result<()>;
}

/// One message pulled from a queue. Must be acked or rejected exactly once.
pub struct Delivery {
    payload: Vec<u8>,
    redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, redelivered: bool, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            redelivered,
            acker,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True when the broker has handed this message out before
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub async fn ack(&self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn reject(&self, requeue: bool) -> Result<()> {
        self.acker.reject(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// Unbounded, lazily-pulled sequence of deliveries. Ends when the
/// underlying subscription is gone.
pub type DeliveryStream = BoxStream<'static, Delivery>;
