//! # Connection Watcher
//!
//! Service-agnostic supervision of long-lived connections (message broker,
//! cache, database). Anything that can answer a ping and rebuild its own
//! connection implements [`Pinger`] and is registered under a name.
//!
//! ## Behavior
//!
//! - One independent check loop per registered service, each on its own
//!   fixed-interval ticker
//! - Every tick: ping with a bounded timeout; on failure, reconnect with a
//!   separate bounded timeout
//! - The outcome of every tick is recorded per service and can be read as a
//!   point-in-time snapshot with [`ConnectionWatcher::statuses`]
//! - A best-effort heartbeat is emitted per service on every tick; nobody
//!   listening never stalls the loop
//!
//! ## Example
//!
//! ```ignore
//! use connection_watcher::{ConnectionWatcher, WatcherConfig};
//! use std::sync::Arc;
//!
//! # async fn example(broker: Arc<amqp_broker::AmqpBroker>) -> connection_watcher::Result<()> {
//! let mut watcher = ConnectionWatcher::new(WatcherConfig::default());
//! watcher.add_service("rmq", broker)?;
//!
//! let _heartbeats = watcher.start()?;
//!
//! // ... later, from a health endpoint:
//! for (name, status) in watcher.statuses() {
//!     println!("{name}: reachable={}", status.reachable);
//! }
//!
//! watcher.stop().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod pinger;
mod status;
mod watcher;

pub use error::{Result, WatchError};
pub use pinger::Pinger;
pub use status::ServiceStatus;
pub use watcher::{ConnectionWatcher, Heartbeats, WatcherConfig};
