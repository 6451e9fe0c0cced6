use thiserror::Error;

/// Errors that can occur when talking to the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The broker refused or failed to accept a message.
    #[error("Publish to {channel} failed: {reason}")]
    Publish { channel: String, reason: String },

    /// The queue already has an active consumer.
    #[error("Queue {0} already has a consumer")]
    AlreadySubscribed(String),

    /// The connection to the broker is gone.
    #[error("Event bus closed")]
    Closed,

    /// A message could not be encoded.
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Result type for event bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
