//! Error types for the fan-out service
//!
//! Every failure while handling a delivery ends up here. The consumer asks
//! [`FanoutError::is_permanent`] to decide whether a redelivery could ever
//! succeed.

use amqp_broker::BrokerError;
use thiserror::Error;

/// Result type for fan-out operations
pub type Result<T> = std::result::Result<T, FanoutError>;

#[derive(Error, Debug)]
pub enum FanoutError {
    /// Payload is not a valid post change event
    #[error("Failed to decode post change event: {0}")]
    Decode(#[from] serde_json::Error),

    /// Operation other than `add` / `remove`
    #[error("Unknown post operation: {0:?}")]
    UnknownOperation(String),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FanoutError {
    /// True when retrying the same message can never succeed
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::UnknownOperation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_errors_are_permanent() {
        let decode = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(FanoutError::Decode(decode).is_permanent());
        assert!(FanoutError::UnknownOperation("update".to_string()).is_permanent());
    }

    #[test]
    fn test_infrastructure_errors_are_transient() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::IoError, "connection reset"));
        assert!(!FanoutError::Redis(redis_err).is_permanent());
        assert!(!FanoutError::Broker(BrokerError::NotConnected).is_permanent());
        assert!(!FanoutError::Database(sqlx::Error::PoolTimedOut).is_permanent());
        assert!(!FanoutError::Internal("boom".to_string()).is_permanent());
    }
}
