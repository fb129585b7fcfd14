pub mod post_fanout;

pub use post_fanout::{FanoutHandler, FanoutOutcome, PostFanoutConsumer};
