//! Capability contract for supervised services

use crate::error::Result;
use async_trait::async_trait;

/// A dependency the watcher can probe and revive.
///
/// Implementations own their connection; the watcher never sees it. Both
/// methods are called from the watcher's check loop and may run concurrently
/// with the service's regular traffic.
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Cheap liveness probe. An error means the connection is unusable.
    async fn ping(&self) -> Result<()>;

    /// Tear down whatever is left of the connection and establish a new one.
    async fn reconnect(&self) -> Result<()>;
}
