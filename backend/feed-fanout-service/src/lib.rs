//! # Feed Fan-out Service
//!
//! Keeps each user's cached feed (a capped list of post IDs) up to date by
//! consuming post add/remove events and writing them into every follower's
//! feed list.
//!
//! - [`cache`]: per-user feed lists and last-refresh timestamps
//! - [`consumers`]: the queue worker doing the fan-out
//! - [`repository`]: follower lookups
//! - [`producer`]: helper for services emitting post change events

pub mod cache;
pub mod config;
pub mod consumers;
pub mod error;
pub mod models;
pub mod producer;
pub mod repository;

pub use cache::{FeedCache, FeedStore, MemoryFeedStore, RedisFeedStore};
pub use config::Config;
pub use consumers::{FanoutHandler, FanoutOutcome, PostFanoutConsumer};
pub use error::{FanoutError, Result};
pub use models::{FeedNotification, PostChangeEvent, PostOperation};
pub use repository::{AudienceRepository, PgAudienceRepository};
