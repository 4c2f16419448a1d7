//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Maximum size of a single message, body plus attributes (SQS limit).
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name following the SQS naming rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(pub(crate) String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        // Validate length
        if name.is_empty() || name.len() > 80 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-80 characters".to_string(),
            });
        }

        // FIFO queues carry a mandatory suffix that is otherwise not allowed
        let base = name.strip_suffix(".fifo").unwrap_or(&name);
        if base.is_empty()
            || !base
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, underscores and a '.fifo' suffix allowed"
                    .to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether this names a FIFO queue
    pub fn is_fifo(&self) -> bool {
        self.0.ends_with(".fifo")
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(name: QueueName) -> Self {
        name.0
    }
}

/// Everything needed to resolve a queue: its name and, for queues owned by
/// another account, the owning account id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueLocator {
    pub name: QueueName,
    pub owner_account: Option<String>,
}

impl QueueLocator {
    pub fn new(name: QueueName) -> Self {
        Self {
            name,
            owner_account: None,
        }
    }

    /// Qualify the queue with the account that owns it
    pub fn with_owner_account(mut self, account: impl Into<String>) -> Self {
        self.owner_account = Some(account.into());
        self
    }
}

impl std::fmt::Display for QueueLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.owner_account {
            Some(account) => write!(f, "{}/{}", account, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Resolved handle for a queue (the queue URL for SQS).
///
/// Resolved once at construction and reused for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueIdentity {
    name: QueueName,
    url: String,
}

impl QueueIdentity {
    pub fn new(name: QueueName, url: impl Into<String>) -> Self {
        Self {
            name,
            url: url.into(),
        }
    }

    pub fn name(&self) -> &QueueName {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for QueueIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Backend-assigned identifier of a message.
///
/// Stable across redeliveries of the same message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque token for deleting a received message.
///
/// A new handle is issued for every delivery of a message; only the most
/// recent one is guaranteed to be accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Message Attributes
// ============================================================================

/// Typed message attribute, mirroring the backend attribute data types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    Number(String),
    Binary(Bytes),
}

impl AttributeValue {
    /// Backend name of the attribute data type
    pub fn data_type(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::Number(_) => "Number",
            Self::Binary(_) => "Binary",
        }
    }

    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    fn encoded_len(&self) -> usize {
        let value_len = match self {
            Self::String(value) | Self::Number(value) => value.len(),
            Self::Binary(bytes) => bytes.len(),
        };
        value_len + self.data_type().len()
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// A message to be sent through the queue backend
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub body: String,
    pub attributes: HashMap<String, AttributeValue>,
    /// FIFO message group
    pub group_id: Option<String>,
    /// FIFO deduplication identifier
    pub deduplication_id: Option<String>,
}

impl OutboundMessage {
    /// Create new message with body
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Add message attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Set the message group for FIFO ordering
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Set the deduplication identifier
    pub fn with_deduplication_id(mut self, id: impl Into<String>) -> Self {
        self.deduplication_id = Some(id.into());
        self
    }

    /// Size of the message as counted against the backend limit
    pub fn size(&self) -> usize {
        self.body.len()
            + self
                .attributes
                .iter()
                .map(|(name, value)| name.len() + value.encoded_len())
                .sum::<usize>()
    }
}

/// A raw message as received from the backend
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    pub body: String,
    pub attributes: HashMap<String, AttributeValue>,
    /// Approximate number of times this message has been received, starting at 1
    pub receive_count: u32,
}

/// Options for a single receive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Maximum number of messages to receive in a batch
    pub max_messages: u32,
    /// How long received messages stay hidden from other receivers
    pub visibility_timeout: Duration,
    /// Long-poll wait when the queue is empty
    pub wait_time: Duration,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: 10,
            visibility_timeout: Duration::from_secs(30),
            wait_time: Duration::from_secs(20),
        }
    }
}

impl ReceiveOptions {
    /// Create new receive options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of messages to receive
    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = max;
        self
    }

    /// Set visibility timeout
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Set long-poll wait
    pub fn with_wait_time(mut self, wait: Duration) -> Self {
        self.wait_time = wait;
        self
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
