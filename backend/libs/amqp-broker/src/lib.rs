//! # AMQP Broker Client
//!
//! Thin, reconnectable wrapper over a single AMQP connection and channel.
//!
//! - [`AmqpBroker::connect`] opens the connection, probes it and declares the
//!   configured exchanges and queues. Failures are reported, never retried here.
//! - [`Broker::publish`] is fire-and-forget (no publisher confirms).
//! - [`Broker::consume`] yields a lazy stream of [`Delivery`] values that must be
//!   acknowledged or rejected one by one. The stream simply ends when the
//!   transport goes away; re-subscribing is the caller's job.
//! - [`AmqpBroker`] implements [`connection_watcher::Pinger`], so a
//!   `ConnectionWatcher` can probe it and swap in a fresh connection.
//!
//! The connection/channel pair lives behind one `RwLock`. Every operation
//! reads the current pair under the lock; a reconnect replaces it under the
//! write lock, so readers never observe a half-swapped state.

mod amqp;
mod broker;
mod config;
mod delivery;
mod error;

pub use amqp::AmqpBroker;
pub use broker::Broker;
pub use config::{AmqpConfig, Exchange, Queue};
pub use delivery::{Acknowledger, Delivery, DeliveryStream};
pub use error::{BrokerError, Result};
