use amqp_broker::AmqpBroker;
use anyhow::Context;
use connection_watcher::ConnectionWatcher;
use feed_fanout_service::{
    Config, FeedCache, PgAudienceRepository, PostFanoutConsumer, RedisFeedStore,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.app.log_level.clone().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    info!(
        service = %config.app.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting feed fan-out service"
    );

    let (exchanges, queues) = config.broker_topology();
    let broker = Arc::new(AmqpBroker::new(config.amqp.clone(), exchanges, queues));
    broker
        .connect()
        .await
        .with_context(|| format!("Cannot connect to RabbitMQ at {}", config.amqp.address()))?;

    let redis_store = Arc::new(
        RedisFeedStore::connect(&config.redis.url())
            .await
            .context("Cannot connect to Redis")?,
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Cannot connect to PostgreSQL")?;

    let mut watcher = ConnectionWatcher::new(config.watcher.clone());
    watcher.add_service("rmq", broker.clone())?;
    watcher.add_service("redis", redis_store.clone())?;
    let _heartbeats = watcher.start()?;

    let cache = FeedCache::new(redis_store, config.feed_cache.max_len)?;
    let audience = Arc::new(PgAudienceRepository::new(db_pool.clone()));
    let mut consumer =
        PostFanoutConsumer::new(broker.clone(), audience, cache, config.fanout.clone());
    consumer
        .start()
        .await
        .context("Failed to start post fan-out consumer")?;

    shutdown_signal().await;
    info!("Shutdown signal received");

    consumer.stop().await;
    watcher.stop().await;

    if let Err(e) = broker.disconnect().await {
        error!(error = %e, "Failed to disconnect from RabbitMQ");
    }
    db_pool.close().await;

    info!("Feed fan-out service stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    }
}
