use crate::delivery::DeliveryStream;
use crate::error::Result;
use async_trait::async_trait;

/// Message operations a consumer or producer needs from the broker.
///
/// Liveness and reconnection are a separate concern, see
/// [`connection_watcher::Pinger`].
#[async_trait]
pub trait Broker: Send + Sync {
    /// Send `payload` to `exchange` with `routing_key`. No delivery
    /// confirmation is awaited; an error means the channel is unusable.
    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> Result<()>;

    /// Subscribe to `queue` with manual acknowledgement.
    async fn consume(&self, queue: &str) -> Result<DeliveryStream>;
}
