//! Error types for queue operations, message decoding and dispatch.

use thiserror::Error;

/// Error type returned by handlers registered with the consumer.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Comprehensive error type for all queue backend operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message not found or receipt expired: {receipt}")]
    MessageNotFound { receipt: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] CodecError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is transient, i.e. the next poll or redelivery may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueNotFound { .. } => false,
            Self::MessageNotFound { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::AuthenticationFailed { .. } => false,
            Self::MessageTooLarge { .. } => false,
            Self::ProviderError { .. } => true, // Provider-specific errors are usually transient
            Self::SerializationError(_) => false,
            Self::ConfigurationError(_) => false,
            Self::ValidationError(_) => false,
        }
    }
}

/// Errors raised while turning a raw backend message into a wire envelope, or a
/// wire envelope back into a typed message.
///
/// Every variant describes a malformed message rather than a business failure.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Message has no '{attribute}' payload attribute")]
    MissingPayload { attribute: &'static str },

    #[error("Attribute '{attribute}' has data type {found}, expected {expected}")]
    UnexpectedDataType {
        attribute: String,
        expected: &'static str,
        found: String,
    },

    #[error("Payload does not carry a type tag: {0}")]
    MissingTypeTag(#[source] serde_json::Error),

    #[error("Headers could not be decoded: {0}")]
    InvalidHeaders(#[source] serde_json::Error),

    #[error("Payload for '{type_name}' could not be decoded: {source}")]
    InvalidPayload {
        type_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Payload could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Reasons a decoded envelope was not successfully handled.
///
/// None of these lead to an acknowledgement; the backend redelivers the message
/// once its visibility timeout elapses.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No handler registered for message type '{type_name}'")]
    UnregisteredType { type_name: String },

    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error("Handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error("Handler panicked: {message}")]
    Panicked { message: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
