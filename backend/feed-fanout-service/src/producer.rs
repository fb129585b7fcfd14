//! Publishing side used by the post write path

use crate::error::{FanoutError, Result};
use crate::models::PostChangeEvent;
use amqp_broker::Broker;
use tracing::debug;

/// Enqueue `event` on `queue` through the default exchange
pub async fn publish_post_change(
    broker: &dyn Broker,
    queue: &str,
    event: &PostChangeEvent,
) -> Result<()> {
    let body = serde_json::to_vec(event)
        .map_err(|e| FanoutError::Internal(format!("Failed to encode post change event: {}", e)))?;

    broker.publish("", queue, &body).await?;

    debug!(
        queue = %queue,
        post_id = %event.post_id,
        operation = %event.operation,
        "Published post change event"
    );
    Ok(())
}
