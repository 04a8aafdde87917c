//! Error types for the messaging layer.

use thiserror::Error;

/// Failures reported by the underlying transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("topic not found: {0}")]
    TopicNotFound(String),
    #[error("subscription not found: {topic}/{subscription}")]
    SubscriptionNotFound { topic: String, subscription: String },
    /// The transport could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The lock token is unknown or was already settled.
    #[error("message lock lost: {0}")]
    LockLost(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// The payload stream ended before its declared length.
    #[error("payload truncated: expected {expected} bytes, read {actual}")]
    PayloadTruncated { expected: u64, actual: u64 },
    #[error("payload read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialization(String),
    #[error("unknown transport '{name}'; available: {available:?}")]
    UnknownTransport {
        name: String,
        available: Vec<&'static str>,
    },
}

/// Error type for messaging factory and endpoint operations.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The factory was closed; no further endpoints or envelopes.
    #[error("messaging factory is closed")]
    FactoryClosed,
    /// The endpoint was closed, directly or by its factory.
    #[error("endpoint is closed: {0}")]
    EndpointClosed(String),
}

impl MessagingError {
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            MessagingError::FactoryClosed | MessagingError::EndpointClosed(_)
        )
    }
}

impl From<std::io::Error> for MessagingError {
    fn from(err: std::io::Error) -> Self {
        MessagingError::Transport(TransportError::Io(err))
    }
}

impl From<bitcode::Error> for TransportError {
    fn from(err: bitcode::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}
