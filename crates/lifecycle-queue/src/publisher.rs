//! Typed message publishing with FIFO group and deduplication ids.

use crate::client::QueueClient;
use crate::codec::{encode, QueueMessage};
use crate::config::PublisherConfig;
use crate::error::QueueError;
use crate::headers::{HeaderMap, HeaderValue};
use crate::message::{MessageId, QueueIdentity};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-call overrides for [`Publisher::send_with`]
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub headers: HeaderMap,
    /// Used verbatim instead of a freshly generated id
    pub deduplication_id: Option<String>,
    /// Used verbatim instead of the message's business key
    pub group_id: Option<String>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_deduplication_id(mut self, id: impl Into<String>) -> Self {
        self.deduplication_id = Some(id.into());
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }
}

/// Sends typed messages to one queue.
///
/// Every send carries a message group id and a deduplication id. Unless the
/// caller supplies one, the deduplication id is a fresh UUID per call: a
/// caller retrying a failed send produces a distinct message, while the
/// backend's own retries of one send are collapsed by its dedup window.
///
/// Send errors are returned as the backend reported them; there are no
/// retries at this layer.
#[derive(Clone)]
pub struct Publisher {
    client: Arc<dyn QueueClient>,
    config: PublisherConfig,
    queue: QueueIdentity,
}

impl Publisher {
    /// Validate the configuration and resolve the target queue.
    ///
    /// Resolution happens once here; a failure means the publisher cannot be
    /// used at all.
    pub async fn new(
        client: Arc<dyn QueueClient>,
        config: PublisherConfig,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        let queue = client.get_queue_url(&config.locator()).await?;

        info!(queue = %queue, "Publisher ready");
        Ok(Self {
            client,
            config,
            queue,
        })
    }

    /// The resolved target queue
    pub fn queue(&self) -> &QueueIdentity {
        &self.queue
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Send a message with no headers and generated ids
    pub async fn send<M: QueueMessage>(&self, message: &M) -> Result<MessageId, QueueError> {
        self.send_with(message, SendOptions::default()).await
    }

    pub async fn send_with<M: QueueMessage>(
        &self,
        message: &M,
        options: SendOptions,
    ) -> Result<MessageId, QueueError> {
        let group_id = options
            .group_id
            .or_else(|| message.group_key())
            .unwrap_or_else(|| self.config.message_group_id.clone());
        let deduplication_id = options
            .deduplication_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let outbound = encode(message, &options.headers)?
            .with_group_id(group_id)
            .with_deduplication_id(deduplication_id);

        let message_id = self.client.send_message(&self.queue, outbound).await?;
        debug!(
            queue = %self.queue,
            message_id = %message_id,
            type_name = M::type_name(),
            "Message sent"
        );
        Ok(message_id)
    }

    /// Health probe: re-resolve the target queue
    pub async fn ping(&self) -> Result<(), QueueError> {
        self.client.get_queue_url(&self.config.locator()).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("queue", &self.queue)
            .field("message_group_id", &self.config.message_group_id)
            .finish()
    }
}

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;
