use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        source: lapin::Error,
    },

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to declare {kind} {name:?}: {source}")]
    Declare {
        kind: &'static str,
        name: String,
        source: lapin::Error,
    },

    #[error("failed to bind queue {queue:?} to exchange {exchange:?}: {source}")]
    Bind {
        queue: String,
        exchange: String,
        source: lapin::Error,
    },

    #[error("failed to delete queue {queue:?}: {source}")]
    DeleteQueue { queue: String, source: lapin::Error },

    #[error("failed to publish message to exchange {exchange:?}: {source}")]
    Publish {
        exchange: String,
        source: lapin::Error,
    },

    #[error("failed to ping: {0}")]
    Ping(#[source] lapin::Error),

    #[error("failed to consume messages from queue {queue:?}: {source}")]
    Consume { queue: String, source: lapin::Error },

    #[error("failed to settle delivery: {0}")]
    Ack(#[source] lapin::Error),

    #[error("failed to close: {0}")]
    Close(#[source] lapin::Error),

    #[error("broker is not connected")]
    NotConnected,
}
