//! The narrow queue backend capability shared by the consumer and the publisher.

use crate::error::QueueError;
use crate::message::{
    MessageId, OutboundMessage, QueueIdentity, QueueLocator, ReceiptHandle, ReceiveOptions,
    ReceivedMessage,
};
use async_trait::async_trait;

/// Backend operations the consumer and publisher depend on.
///
/// Implementations perform no retries or backoff; that belongs to callers.
/// Every operation is a future, so dropping it cancels the call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Resolve a queue name (and optional owning account) to its identity
    async fn get_queue_url(&self, locator: &QueueLocator) -> Result<QueueIdentity, QueueError>;

    /// Send a single message, returning the backend-assigned message id
    async fn send_message(
        &self,
        queue: &QueueIdentity,
        message: OutboundMessage,
    ) -> Result<MessageId, QueueError>;

    /// Receive up to `options.max_messages` messages, hiding them for the
    /// visibility timeout
    async fn receive_messages(
        &self,
        queue: &QueueIdentity,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Delete a received message, acknowledging it
    async fn delete_message(
        &self,
        queue: &QueueIdentity,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError>;
}
