use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the event bus.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// The bus could not be reached or configured.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A message could not be published.
    #[error("Publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Publishing did not complete before the deadline.
    #[error("Publish to '{topic}' timed out after {timeout:?}")]
    PublishTimeout { topic: String, timeout: Duration },

    /// A subscription could not be established.
    #[error("Subscribe to '{topic}' as '{consumer_group}' failed: {reason}")]
    Subscribe {
        topic: String,
        consumer_group: String,
        reason: String,
    },

    /// Reading from an established subscription failed.
    #[error("Consume from '{topic}' failed: {reason}")]
    Consume { topic: String, reason: String },

    /// An event could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventBusError {
    /// Returns true for errors raised while publishing.
    pub fn is_publish_error(&self) -> bool {
        matches!(
            self,
            EventBusError::Publish { .. }
                | EventBusError::PublishTimeout { .. }
                | EventBusError::Serialization(_)
        )
    }
}

/// Result type for event bus operations.
pub type Result<T> = std::result::Result<T, EventBusError>;
