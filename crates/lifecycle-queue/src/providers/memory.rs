//! In-memory queue backend for testing and development.
//!
//! Behaves like the managed queue where the consumer and publisher can observe
//! it:
//! - queues must be created before they can be resolved
//! - received messages stay hidden for the visibility timeout and are then
//!   redelivered with a fresh receipt handle and an incremented receive count
//! - only the latest receipt handle of a message deletes it
//! - FIFO queues suppress repeated deduplication ids within a five minute
//!   window and never hand out a message while an earlier one of the same
//!   group is in flight
//! - receive calls long-poll up to the requested wait time
//!
//! Call counters and fault injection let tests assert on, and interfere with,
//! the traffic the client sees.

use crate::client::QueueClient;
use crate::error::{QueueError, ValidationError};
use crate::message::{
    AttributeValue, MessageId, OutboundMessage, QueueIdentity, QueueLocator, QueueName,
    ReceiptHandle, ReceiveOptions, ReceivedMessage, MAX_MESSAGE_SIZE,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// How long a FIFO deduplication id suppresses later sends
pub const DEDUPLICATION_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Granularity at which a long-polling receive rechecks the queue
const POLL_SLICE: Duration = Duration::from_millis(10);

// ============================================================================
// Internal Storage Structures
// ============================================================================

#[derive(Default)]
struct QueueStorage {
    /// Queue URL to queue state
    queues: HashMap<String, InMemoryQueue>,
    /// Resolution table from locator to queue URL
    urls: HashMap<QueueLocator, String>,
}

struct InMemoryQueue {
    fifo: bool,
    messages: VecDeque<StoredMessage>,
    /// Deduplication id to the message it produced and when it was first seen
    deduplication: HashMap<String, (MessageId, Instant)>,
}

impl InMemoryQueue {
    fn new(fifo: bool) -> Self {
        Self {
            fifo,
            messages: VecDeque::new(),
            deduplication: HashMap::new(),
        }
    }

    fn purge_expired_deduplication(&mut self, now: Instant) {
        self.deduplication
            .retain(|_, (_, seen_at)| now.duration_since(*seen_at) < DEDUPLICATION_WINDOW);
    }

    fn take_visible(&mut self, options: &ReceiveOptions, now: Instant) -> Vec<ReceivedMessage> {
        let mut received = Vec::new();
        let mut blocked_groups: HashSet<String> = HashSet::new();

        for stored in self.messages.iter_mut() {
            if received.len() >= options.max_messages as usize {
                break;
            }

            let group = if self.fifo {
                stored.group_id.clone()
            } else {
                None
            };
            if let Some(group) = &group {
                if blocked_groups.contains(group) {
                    continue;
                }
            }

            if !stored.is_visible(now) {
                if let Some(group) = group {
                    blocked_groups.insert(group);
                }
                continue;
            }

            let receipt = ReceiptHandle::new(uuid::Uuid::new_v4().to_string());
            stored.receive_count += 1;
            stored.visible_at = now + options.visibility_timeout;
            stored.receipt = Some(receipt.clone());

            received.push(ReceivedMessage {
                message_id: stored.message_id.clone(),
                receipt_handle: receipt,
                body: stored.body.clone(),
                attributes: stored.attributes.clone(),
                receive_count: stored.receive_count,
            });

            // Later messages of the group wait for this one to be deleted
            if let Some(group) = group {
                blocked_groups.insert(group);
            }
        }

        received
    }
}

struct StoredMessage {
    message_id: MessageId,
    body: String,
    attributes: HashMap<String, AttributeValue>,
    group_id: Option<String>,
    receive_count: u32,
    visible_at: Instant,
    /// Receipt of the latest delivery; earlier receipts no longer delete
    receipt: Option<ReceiptHandle>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        now >= self.visible_at
    }
}

#[derive(Default)]
struct Counters {
    receive: AtomicUsize,
    send: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    resolve: AtomicUsize,
    receive: AtomicUsize,
    send: AtomicUsize,
    delete: AtomicUsize,
}

/// Consume one pending injected fault, if any
fn take_fault(pending: &AtomicUsize, operation: &str) -> Result<(), QueueError> {
    let injected = pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if injected {
        return Err(QueueError::ConnectionFailed {
            message: format!("injected {} failure", operation),
        });
    }
    Ok(())
}

// ============================================================================
// InMemoryQueueClient
// ============================================================================

/// In-memory [`QueueClient`].
///
/// Cloning is cheap and every clone shares the same queues, counters and
/// pending faults.
#[derive(Clone, Default)]
pub struct InMemoryQueueClient {
    storage: Arc<Mutex<QueueStorage>>,
    counters: Arc<Counters>,
    faults: Arc<Faults>,
}

impl InMemoryQueueClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn storage(&self) -> MutexGuard<'_, QueueStorage> {
        // Storage is never left half-updated, so a poisoned lock is still usable
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a queue owned by the local account. Creating an existing queue
    /// returns its identity unchanged.
    pub fn create_queue(&self, name: QueueName) -> QueueIdentity {
        self.create_queue_at(QueueLocator::new(name))
    }

    /// Create a queue, possibly owned by another account
    pub fn create_queue_at(&self, locator: QueueLocator) -> QueueIdentity {
        let url = format!(
            "memory://{}/{}",
            locator.owner_account.as_deref().unwrap_or("local"),
            locator.name
        );

        let mut storage = self.storage();
        let fifo = locator.name.is_fifo();
        let identity = QueueIdentity::new(locator.name.clone(), url.clone());
        storage
            .queues
            .entry(url.clone())
            .or_insert_with(|| InMemoryQueue::new(fifo));
        storage.urls.insert(locator, url);
        identity
    }

    /// Messages in the queue, visible or in flight
    pub fn message_count(&self, queue: &QueueIdentity) -> usize {
        self.storage()
            .queues
            .get(queue.url())
            .map_or(0, |q| q.messages.len())
    }

    /// Messages received and neither deleted nor yet visible again
    pub fn in_flight_count(&self, queue: &QueueIdentity) -> usize {
        let now = Instant::now();
        self.storage().queues.get(queue.url()).map_or(0, |q| {
            q.messages
                .iter()
                .filter(|m| m.receipt.is_some() && !m.is_visible(now))
                .count()
        })
    }

    pub fn receive_calls(&self) -> usize {
        self.counters.receive.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.counters.send.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    /// Make the next `count` queue resolutions fail with a connection error
    pub fn fail_next_resolves(&self, count: usize) {
        self.faults.resolve.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` receive calls fail with a connection error
    pub fn fail_next_receives(&self, count: usize) {
        self.faults.receive.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` send calls fail with a connection error
    pub fn fail_next_sends(&self, count: usize) {
        self.faults.send.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` delete calls fail with a connection error
    pub fn fail_next_deletes(&self, count: usize) {
        self.faults.delete.store(count, Ordering::SeqCst);
    }

    fn try_receive(
        &self,
        queue: &QueueIdentity,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut storage = self.storage();
        let state = storage
            .queues
            .get_mut(queue.url())
            .ok_or_else(|| not_found(queue))?;
        Ok(state.take_visible(options, Instant::now()))
    }
}

impl std::fmt::Debug for InMemoryQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryQueueClient")
            .field("queues", &self.storage().queues.len())
            .finish()
    }
}

fn not_found(queue: &QueueIdentity) -> QueueError {
    QueueError::QueueNotFound {
        queue_name: queue.name().to_string(),
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn get_queue_url(&self, locator: &QueueLocator) -> Result<QueueIdentity, QueueError> {
        take_fault(&self.faults.resolve, "resolve")?;

        self.storage()
            .urls
            .get(locator)
            .map(|url| QueueIdentity::new(locator.name.clone(), url.clone()))
            .ok_or_else(|| QueueError::QueueNotFound {
                queue_name: locator.to_string(),
            })
    }

    async fn send_message(
        &self,
        queue: &QueueIdentity,
        message: OutboundMessage,
    ) -> Result<MessageId, QueueError> {
        self.counters.send.fetch_add(1, Ordering::SeqCst);
        take_fault(&self.faults.send, "send")?;

        let size = message.size();
        if size > MAX_MESSAGE_SIZE {
            return Err(QueueError::MessageTooLarge {
                size,
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        let now = Instant::now();
        let mut storage = self.storage();
        let state = storage
            .queues
            .get_mut(queue.url())
            .ok_or_else(|| not_found(queue))?;

        if state.fifo {
            if message.group_id.is_none() {
                return Err(ValidationError::Required {
                    field: "message_group_id".to_string(),
                }
                .into());
            }

            state.purge_expired_deduplication(now);
            if let Some(dedup_id) = &message.deduplication_id {
                if let Some((existing, _)) = state.deduplication.get(dedup_id) {
                    return Ok(existing.clone());
                }
            }
        }

        let message_id = MessageId::new();
        if state.fifo {
            if let Some(dedup_id) = &message.deduplication_id {
                state
                    .deduplication
                    .insert(dedup_id.clone(), (message_id.clone(), now));
            }
        }

        state.messages.push_back(StoredMessage {
            message_id: message_id.clone(),
            body: message.body,
            attributes: message.attributes,
            group_id: message.group_id,
            receive_count: 0,
            visible_at: now,
            receipt: None,
        });

        Ok(message_id)
    }

    async fn receive_messages(
        &self,
        queue: &QueueIdentity,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.counters.receive.fetch_add(1, Ordering::SeqCst);
        take_fault(&self.faults.receive, "receive")?;

        let deadline = Instant::now() + options.wait_time;
        loop {
            let received = self.try_receive(queue, options)?;
            let now = Instant::now();
            if !received.is_empty() || now >= deadline {
                return Ok(received);
            }
            tokio::time::sleep(POLL_SLICE.min(deadline - now)).await;
        }
    }

    async fn delete_message(
        &self,
        queue: &QueueIdentity,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        take_fault(&self.faults.delete, "delete")?;

        let mut storage = self.storage();
        let state = storage
            .queues
            .get_mut(queue.url())
            .ok_or_else(|| not_found(queue))?;

        let position = state
            .messages
            .iter()
            .position(|m| m.receipt.as_ref() == Some(receipt))
            .ok_or_else(|| QueueError::MessageNotFound {
                receipt: receipt.to_string(),
            })?;
        state.messages.remove(position);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
