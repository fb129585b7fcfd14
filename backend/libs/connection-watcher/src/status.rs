//! Per-service health snapshot

use chrono::{DateTime, Utc};

/// Outcome of the most recent check of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// True when the last ping (or the reconnect that followed it) succeeded
    pub reachable: bool,
    /// Error from the last check, if it failed
    pub last_error: Option<String>,
    /// When the last check finished
    pub last_checked_at: DateTime<Utc>,
}

impl ServiceStatus {
    pub(crate) fn from_check(error: Option<String>) -> Self {
        Self {
            reachable: error.is_none(),
            last_error: error,
            last_checked_at: Utc::now(),
        }
    }
}
