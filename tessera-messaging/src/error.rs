//! Error types for message sending.

use tessera_common::ConfigError;
use thiserror::Error;

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Errors surfaced to callers of a message sender.
///
/// Transport faults never appear here. A resilient sender absorbs them
/// and reconnects.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The builder reached a terminal operation without `to_queue`/`to_topic`.
    #[error("message has no destination")]
    MissingDestination,

    /// The sender was stopped before the message could be delivered.
    #[error("message channel is closed")]
    ChannelClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reported by a [`Transport`](crate::Transport) or one of its connections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The broker refused the settings; retrying cannot help.
    #[error("rejected by broker: {0}")]
    Rejected(String),

    /// The broker could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// An established connection stopped working.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
}
