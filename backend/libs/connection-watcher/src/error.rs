//! Error types for connection supervision

use std::time::Duration;
use thiserror::Error;

/// Result type for watcher and pinger operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors reported by a supervised service or by the watcher itself
#[derive(Debug, Error)]
pub enum WatchError {
    /// Liveness probe failed
    #[error("ping failed: {0}")]
    Ping(String),

    /// Connection could not be re-established
    #[error("reconnect failed: {0}")]
    Reconnect(String),

    /// Probe or reconnect did not finish within its bound
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Registration attempted once the check loops are running
    #[error("watcher already started, cannot register service {0:?}")]
    AlreadyStarted(String),

    /// `start` called twice without a `stop` in between
    #[error("watcher is already running")]
    AlreadyRunning,
}

impl WatchError {
    /// Create a ping error
    pub fn ping(msg: impl Into<String>) -> Self {
        Self::Ping(msg.into())
    }

    /// Create a reconnect error
    pub fn reconnect(msg: impl Into<String>) -> Self {
        Self::Reconnect(msg.into())
    }
}
