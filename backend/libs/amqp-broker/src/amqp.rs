//! lapin-backed broker client

use crate::broker::Broker;
use crate::config::{AmqpConfig, Exchange, Queue};
use crate::delivery::{Acknowledger, Delivery, DeliveryStream};
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use connection_watcher::{Pinger, WatchError};
use futures::{future, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PUBLISH_CONTENT_TYPE: &str = "text/json";
const TRANSIENT_DELIVERY_MODE: u8 = 1;
const PING_BODY: &[u8] = b"test";
const REPLY_SUCCESS: u16 = 200;

/// The live connection and the one channel opened on it
struct AmqpHandles {
    connection: Connection,
    channel: Channel,
}

impl AmqpHandles {
    /// Close channel, then connection. Both are attempted; the first error wins.
    async fn close(self) -> Result<()> {
        let channel_closed = self
            .channel
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(BrokerError::Close);
        let connection_closed = self
            .connection
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(BrokerError::Close);

        channel_closed.and(connection_closed)
    }
}

/// Broker client owning a single AMQP connection and channel.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct AmqpBroker {
    config: AmqpConfig,
    exchanges: Vec<Exchange>,
    queues: Vec<Queue>,
    handles: RwLock<Option<AmqpHandles>>,
}

impl AmqpBroker {
    pub fn new(config: AmqpConfig, exchanges: Vec<Exchange>, queues: Vec<Queue>) -> Self {
        Self {
            config,
            exchanges,
            queues,
            handles: RwLock::new(None),
        }
    }

    /// Open connection and channel, probe them, declare the configured
    /// topology, then install them as the current pair.
    pub async fn connect(&self) -> Result<()> {
        let fresh = self.open().await?;
        let previous = self.handles.write().await.replace(fresh);

        if let Some(previous) = previous {
            if let Err(e) = previous.close().await {
                debug!(error = %e, "Closing replaced AMQP connection failed");
            }
        }

        info!(address = %self.config.address(), "Connected to AMQP broker");
        Ok(())
    }

    /// Drop the current pair (errors are logged) and connect again. Holds the
    /// write lock throughout, so concurrent operations wait for the new pair.
    pub async fn reconnect(&self) -> Result<()> {
        let mut handles = self.handles.write().await;

        if let Some(stale) = handles.take() {
            if let Err(e) = stale.close().await {
                warn!(error = %e, "Failed to disconnect stale AMQP connection");
            }
        }

        *handles = Some(self.open().await?);

        info!(address = %self.config.address(), "Reconnected to AMQP broker");
        Ok(())
    }

    /// Close channel then connection, reporting the first error.
    pub async fn disconnect(&self) -> Result<()> {
        let current = self.handles.write().await.take();

        match current {
            Some(handles) => {
                handles.close().await?;
                info!("Disconnected from AMQP broker");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Publish a throwaway transient message to the default exchange. An
    /// error means the channel is dead.
    pub async fn ping(&self) -> Result<()> {
        let handles = self.handles.read().await;
        let current = handles.as_ref().ok_or(BrokerError::NotConnected)?;
        ping_channel(&current.channel).await
    }

    pub async fn declare_exchange(&self, exchange: &Exchange) -> Result<()> {
        let handles = self.handles.read().await;
        let current = handles.as_ref().ok_or(BrokerError::NotConnected)?;
        declare_exchange(&current.channel, exchange).await
    }

    pub async fn declare_queue(&self, queue: &Queue) -> Result<lapin::Queue> {
        let handles = self.handles.read().await;
        let current = handles.as_ref().ok_or(BrokerError::NotConnected)?;
        declare_queue(&current.channel, queue).await
    }

    pub async fn delete_queue(&self, queue: &str) -> Result<()> {
        let handles = self.handles.read().await;
        let current = handles.as_ref().ok_or(BrokerError::NotConnected)?;

        current
            .channel
            .queue_delete(queue, QueueDeleteOptions::default())
            .await
            .map_err(|source| BrokerError::DeleteQueue {
                queue: queue.to_string(),
                source,
            })?;

        Ok(())
    }

    pub async fn bind_queue(&self, queue: &str, exchange: &str, routing_key: &str) -> Result<()> {
        let handles = self.handles.read().await;
        let current = handles.as_ref().ok_or(BrokerError::NotConnected)?;

        current
            .channel
            .queue_bind(
                queue,
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Bind {
                queue: queue.to_string(),
                exchange: exchange.to_string(),
                source,
            })
    }

    async fn open(&self) -> Result<AmqpHandles> {
        let connection = Connection::connect(&self.config.uri(), ConnectionProperties::default())
            .await
            .map_err(|source| BrokerError::Connect {
                address: self.config.address(),
                source,
            })?;

        let channel = connection
            .create_channel()
            .await
            .map_err(BrokerError::Channel)?;

        ping_channel(&channel).await?;

        for exchange in &self.exchanges {
            declare_exchange(&channel, exchange).await?;
        }
        for queue in &self.queues {
            declare_queue(&channel, queue).await?;
        }

        Ok(AmqpHandles {
            connection,
            channel,
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> Result<()> {
        let handles = self.handles.read().await;
        let current = handles.as_ref().ok_or(BrokerError::NotConnected)?;

        current
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_content_type(PUBLISH_CONTENT_TYPE.into()),
            )
            .await
            .map_err(|source| BrokerError::Publish {
                exchange: exchange.to_string(),
                source,
            })?;

        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let handles = self.handles.read().await;
        let current = handles.as_ref().ok_or(BrokerError::NotConnected)?;

        let consumer_tag = format!("{}-{}", queue, Uuid::new_v4());
        let consumer = current
            .channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Consume {
                queue: queue.to_string(),
                source,
            })?;

        debug!(queue = %queue, consumer_tag = %consumer_tag, "Subscribed to queue");

        // A transport error ends the stream; callers re-subscribe on end.
        let queue_name = queue.to_string();
        let deliveries = consumer
            .take_while(move |item| {
                if let Err(e) = item {
                    warn!(queue = %queue_name, error = %e, "AMQP delivery stream failed");
                }
                future::ready(item.is_ok())
            })
            .filter_map(|item| future::ready(item.ok().map(Delivery::from)));

        Ok(deliveries.boxed())
    }
}

#[async_trait]
impl Pinger for AmqpBroker {
    async fn ping(&self) -> connection_watcher::Result<()> {
        AmqpBroker::ping(self)
            .await
            .map_err(|e| WatchError::ping(e.to_string()))
    }

    async fn reconnect(&self) -> connection_watcher::Result<()> {
        AmqpBroker::reconnect(self)
            .await
            .map_err(|e| WatchError::reconnect(e.to_string()))
    }
}

struct AmqpAcker(lapin::acker::Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(BrokerError::Ack)
    }

    async fn reject(&self, requeue: bool) -> Result<()> {
        self.0
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(BrokerError::Ack)
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        Delivery::new(
            delivery.data,
            delivery.redelivered,
            Box::new(AmqpAcker(delivery.acker)),
        )
    }
}

async fn ping_channel(channel: &Channel) -> Result<()> {
    channel
        .basic_publish(
            "",
            "",
            BasicPublishOptions::default(),
            PING_BODY,
            BasicProperties::default().with_delivery_mode(TRANSIENT_DELIVERY_MODE),
        )
        .await
        .map_err(BrokerError::Ping)?;

    Ok(())
}

async fn declare_exchange(channel: &Channel, exchange: &Exchange) -> Result<()> {
    channel
        .exchange_declare(
            &exchange.name,
            exchange.lapin_kind(),
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Declare {
            kind: "exchange",
            name: exchange.name.clone(),
            source,
        })
}

async fn declare_queue(channel: &Channel, queue: &Queue) -> Result<lapin::Queue> {
    channel
        .queue_declare(
            &queue.name,
            QueueDeclareOptions {
                durable: queue.durable,
                auto_delete: queue.auto_delete,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Declare {
            kind: "queue",
            name: queue.name.clone(),
            source,
        })
}
