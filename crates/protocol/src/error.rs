use thiserror::Error;

use crate::message::MessageType;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message size ({size} bytes) exceeds maximum ({max} bytes)")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {0}")]
    InvalidFormat(String),

    #[error("Message must be a JSON object, not {0}")]
    NotAnObject(&'static str),

    #[error("Missing version field")]
    MissingVersion,

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(serde_json::Value),

    #[error("Expected a {expected} message, got {actual}")]
    UnexpectedType {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("Invalid codec configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
