//! Integration tests against a live RabbitMQ
//!
//! Start a broker:
//! ```bash
//! docker run --rm -p 5672:5672 rabbitmq:3
//! cargo test --package amqp-broker --test rabbitmq_test -- --ignored
//! ```

use amqp_broker::{AmqpBroker, AmqpConfig, Broker, Exchange, Queue};
use futures::StreamExt;
use std::time::Duration;
use uuid::Uuid;

fn config_from_env() -> AmqpConfig {
    let defaults = AmqpConfig::default();
    AmqpConfig {
        host: std::env::var("RMQ_HOST").unwrap_or(defaults.host),
        port: std::env::var("RMQ_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port),
        username: std::env::var("RMQ_USERNAME").unwrap_or(defaults.username),
        password: std::env::var("RMQ_PASSWORD").unwrap_or(defaults.password),
        vhost: defaults.vhost,
    }
}

fn scratch_queue() -> Queue {
    Queue {
        name: format!("test-{}", Uuid::new_v4()),
        durable: false,
        auto_delete: true,
    }
}

#[ignore = "Requires RabbitMQ"]
#[tokio::test]
async fn test_publish_consume_ack_roundtrip() {
    let queue = scratch_queue();
    let broker = AmqpBroker::new(config_from_env(), vec![], vec![queue.clone()]);
    broker.connect().await.expect("connect");

    let mut deliveries = broker.consume(&queue.name).await.expect("consume");
    broker
        .publish("", &queue.name, br#"{"operation":"add"}"#)
        .await
        .expect("publish");

    let delivery = tokio::time::timeout(Duration::from_secs(5), deliveries.next())
        .await
        .expect("delivery timed out")
        .expect("stream ended");
    assert_eq!(delivery.payload(), br#"{"operation":"add"}"#);
    assert!(!delivery.redelivered());
    delivery.ack().await.expect("ack");

    broker.disconnect().await.expect("disconnect");
}

#[ignore = "Requires RabbitMQ"]
#[tokio::test]
async fn test_rejected_with_requeue_is_redelivered() {
    let queue = scratch_queue();
    let broker = AmqpBroker::new(config_from_env(), vec![], vec![queue.clone()]);
    broker.connect().await.expect("connect");

    let mut deliveries = broker.consume(&queue.name).await.expect("consume");
    broker.publish("", &queue.name, b"retry-me").await.expect("publish");

    let first = deliveries.next().await.expect("first delivery");
    first.reject(true).await.expect("reject");

    let second = tokio::time::timeout(Duration::from_secs(5), deliveries.next())
        .await
        .expect("redelivery timed out")
        .expect("stream ended");
    assert_eq!(second.payload(), b"retry-me");
    assert!(second.redelivered());
    second.ack().await.expect("ack");

    broker.disconnect().await.expect("disconnect");
}

#[ignore = "Requires RabbitMQ"]
#[tokio::test]
async fn test_reconnect_ends_old_stream_and_keeps_topology() {
    let queue = scratch_queue();
    let exchange = Exchange::new(format!("test-x-{}", Uuid::new_v4()), "direct");
    let broker = AmqpBroker::new(config_from_env(), vec![exchange.clone()], vec![queue.clone()]);
    broker.connect().await.expect("connect");

    let mut stale = broker.consume(&queue.name).await.expect("consume");
    broker.reconnect().await.expect("reconnect");
    broker.ping().await.expect("ping after reconnect");

    let ended = tokio::time::timeout(Duration::from_secs(5), stale.next())
        .await
        .expect("old stream did not end");
    assert!(ended.is_none());

    broker
        .bind_queue(&queue.name, &exchange.name, "user-1")
        .await
        .expect("bind");
    let mut fresh = broker.consume(&queue.name).await.expect("re-consume");
    broker
        .publish(&exchange.name, "user-1", b"routed")
        .await
        .expect("publish");

    let delivery = tokio::time::timeout(Duration::from_secs(5), fresh.next())
        .await
        .expect("delivery timed out")
        .expect("stream ended");
    assert_eq!(delivery.payload(), b"routed");
    delivery.ack().await.expect("ack");

    broker.delete_queue(&queue.name).await.expect("delete queue");
    broker.disconnect().await.expect("disconnect");
}
