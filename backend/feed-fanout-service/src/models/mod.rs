//! Wire messages exchanged over the broker

use crate::error::FanoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What happened to a post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOperation {
    Add,
    Remove,
}

impl PostOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostOperation::Add => "add",
            PostOperation::Remove => "remove",
        }
    }
}

impl fmt::Display for PostOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostOperation {
    type Err = FanoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(PostOperation::Add),
            "remove" => Ok(PostOperation::Remove),
            other => Err(FanoutError::UnknownOperation(other.to_string())),
        }
    }
}

/// Published once per post mutation by the post write path and consumed
/// from the fan-out queue.
///
/// `operation` is kept as the raw string so an unknown value decodes and is
/// reported as [`FanoutError::UnknownOperation`] rather than a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostChangeEvent {
    #[serde(default)]
    pub operation: String,
    pub post_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_text: Option<String>,
    pub author_id: String,
}

impl PostChangeEvent {
    pub fn added(
        post_id: impl Into<String>,
        post_text: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Self {
        Self {
            operation: PostOperation::Add.as_str().to_string(),
            post_id: post_id.into(),
            post_text: Some(post_text.into()),
            author_id: author_id.into(),
        }
    }

    pub fn removed(post_id: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            operation: PostOperation::Remove.as_str().to_string(),
            post_id: post_id.into(),
            post_text: None,
            author_id: author_id.into(),
        }
    }

    pub fn operation(&self) -> Result<PostOperation, FanoutError> {
        self.operation.parse()
    }
}

/// Per-follower notice re-published for every added post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedNotification {
    pub post_id: String,
    pub post_text: String,
    pub author_id: String,
}

impl From<&PostChangeEvent> for FeedNotification {
    fn from(event: &PostChangeEvent) -> Self {
        Self {
            post_id: event.post_id.clone(),
            post_text: event.post_text.clone().unwrap_or_default(),
            author_id: event.author_id.clone(),
        }
    }
}
