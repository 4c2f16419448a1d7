//! Queue consumer: poll loop, decode/dispatch worker pool and acknowledgement.
//!
//! ```text
//!                  raw buffer              decoded buffer
//!  poll loop ──▶ [ bounded MPMC ] ──▶ ┐  [ bounded MPMC ] ──▶ ┐
//!                                      │        ▲               │
//!                                      ▼        │               ▼
//!                              worker: decode ──┘      worker: dispatch ──▶ handler
//!                                                                   │
//!                                                        success: delete (ack)
//! ```
//!
//! Every message moves through `received → decoded → dispatched` and ends
//! either acked (the handler succeeded and the message was deleted) or
//! abandoned (anything else). An abandoned message is never deleted, so the
//! backend hands it out again once its visibility timeout elapses. That
//! redelivery is the only retry mechanism at this layer: handlers must be
//! idempotent, and poison messages keep cycling until the backend's own
//! dead-letter policy takes them.
//!
//! Both buffers are bounded. Workers always prefer dispatching over decoding,
//! and a worker whose decoded envelope does not fit in the full decoded buffer
//! dispatches it itself. When every worker is stuck in a handler the raw
//! buffer fills up and the poll loop stops receiving.

use crate::ack::AckTable;
use crate::client::QueueClient;
use crate::codec::{self, WireEnvelope};
use crate::config::ConsumerConfig;
use crate::error::{DispatchError, QueueError};
use crate::message::{QueueIdentity, ReceivedMessage};
use crate::registry::{DispatchContext, HandlerRegistry};
use async_channel::{Receiver, Sender, TrySendError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Consumes one queue and dispatches its messages to registered handlers.
///
/// Cloning is cheap; clones share the resolved queue, the registry and the
/// ack table.
#[derive(Clone)]
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

struct ConsumerInner {
    client: Arc<dyn QueueClient>,
    registry: HandlerRegistry,
    config: ConsumerConfig,
    queue: QueueIdentity,
    acks: AckTable,
}

impl Consumer {
    /// Validate the configuration and resolve the queue.
    ///
    /// A resolution failure is fatal: the consumer cannot be built and the
    /// process is expected not to start.
    pub async fn new(
        client: Arc<dyn QueueClient>,
        registry: HandlerRegistry,
        config: ConsumerConfig,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        let queue = client.get_queue_url(&config.locator()).await?;

        if registry.is_empty() {
            warn!(
                queue = %queue,
                "Consumer has no registered handlers; every message will be abandoned"
            );
        }
        info!(
            queue = %queue,
            workers = config.worker_count,
            types = ?registry.type_names(),
            "Consumer ready"
        );

        Ok(Self {
            inner: Arc::new(ConsumerInner {
                client,
                registry,
                config,
                queue,
                acks: AckTable::new(),
            }),
        })
    }

    pub fn queue(&self) -> &QueueIdentity {
        &self.inner.queue
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.inner.config
    }

    /// Messages decoded but not yet acked or abandoned
    pub fn pending_acks(&self) -> usize {
        self.inner.acks.len()
    }

    /// Health probe: re-resolve the queue
    pub async fn ping(&self) -> Result<(), QueueError> {
        self.inner
            .client
            .get_queue_url(&self.inner.config.locator())
            .await?;
        Ok(())
    }

    /// Run the poll loop and the worker pool until `token` is cancelled.
    ///
    /// Messages still buffered or mid-dispatch at cancellation are abandoned
    /// to redelivery.
    pub async fn run(&self, token: CancellationToken) {
        let config = &self.inner.config;
        let (raw_tx, raw_rx) = async_channel::bounded(config.raw_buffer_capacity);
        let (decoded_tx, decoded_rx) = async_channel::bounded(config.decoded_buffer_capacity);

        let mut tasks = JoinSet::new();
        tasks.spawn(Arc::clone(&self.inner).poll_loop(raw_tx, token.clone()));
        for worker in 0..config.worker_count {
            tasks.spawn(Arc::clone(&self.inner).worker_loop(
                worker,
                raw_rx.clone(),
                decoded_tx.clone(),
                decoded_rx.clone(),
                token.clone(),
            ));
        }
        drop(decoded_tx);

        info!(queue = %self.inner.queue, workers = config.worker_count, "Consumer started");

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(queue = %self.inner.queue, error = %e, "Consumer task failed");
            }
        }

        // Decoded but never dispatched
        while let Ok(envelope) = decoded_rx.try_recv() {
            self.inner.acks.settle(&envelope.id, &envelope.receipt);
        }

        info!(queue = %self.inner.queue, "Consumer stopped");
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("queue", &self.inner.queue)
            .field("registry", &self.inner.registry)
            .field("pending_acks", &self.inner.acks.len())
            .finish()
    }
}

enum Job {
    Decode(ReceivedMessage),
    Dispatch(WireEnvelope),
}

impl ConsumerInner {
    async fn poll_loop(
        self: Arc<Self>,
        raw_tx: Sender<ReceivedMessage>,
        token: CancellationToken,
    ) {
        let options = self.config.receive_options();
        let empty_delay = self.config.empty_poll_delay();
        debug!(queue = %self.queue, "Poll loop started");

        'poll: loop {
            let received = tokio::select! {
                _ = token.cancelled() => break,
                received = self.client.receive_messages(&self.queue, &options) => received,
            };

            match received {
                Ok(messages) if messages.is_empty() => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(empty_delay) => {}
                    }
                }
                Ok(messages) => {
                    debug!(queue = %self.queue, count = messages.len(), "Received messages");
                    for message in messages {
                        tokio::select! {
                            _ = token.cancelled() => break 'poll,
                            sent = raw_tx.send(message) => {
                                if sent.is_err() {
                                    break 'poll;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        queue = %self.queue,
                        error = %e,
                        transient = e.is_transient(),
                        "Receive failed; retrying"
                    );
                    tokio::task::yield_now().await;
                }
            }
        }

        debug!(queue = %self.queue, "Poll loop stopped");
    }

    async fn worker_loop(
        self: Arc<Self>,
        worker: usize,
        raw_rx: Receiver<ReceivedMessage>,
        decoded_tx: Sender<WireEnvelope>,
        decoded_rx: Receiver<WireEnvelope>,
        token: CancellationToken,
    ) {
        debug!(worker, "Worker started");

        loop {
            let job = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                Ok(envelope) = decoded_rx.recv() => Job::Dispatch(envelope),
                Ok(raw) = raw_rx.recv() => Job::Decode(raw),
                else => break,
            };

            match job {
                Job::Dispatch(envelope) => self.dispatch(envelope, &token).await,
                Job::Decode(raw) => {
                    let Some(envelope) = self.decode(raw) else {
                        continue;
                    };
                    match decoded_tx.try_send(envelope) {
                        Ok(()) => {}
                        Err(TrySendError::Full(envelope)) => {
                            self.dispatch(envelope, &token).await
                        }
                        Err(TrySendError::Closed(envelope)) => {
                            self.acks.settle(&envelope.id, &envelope.receipt);
                        }
                    }
                }
            }
        }

        debug!(worker, "Worker stopped");
    }

    /// Decode a raw message and start tracking it for acknowledgement.
    ///
    /// A malformed message is dropped untracked and will be redelivered.
    fn decode(&self, raw: ReceivedMessage) -> Option<WireEnvelope> {
        match codec::decode(&raw) {
            Ok(envelope) => {
                self.acks
                    .insert(envelope.id.clone(), envelope.receipt.clone());
                Some(envelope)
            }
            Err(e) => {
                warn!(
                    queue = %self.queue,
                    message_id = %raw.message_id,
                    receive_count = raw.receive_count,
                    error = %e,
                    "Malformed message; leaving it for redelivery"
                );
                None
            }
        }
    }

    async fn dispatch(&self, envelope: WireEnvelope, token: &CancellationToken) {
        let span = info_span!(
            "dispatch",
            queue = %self.queue,
            message_id = %envelope.id,
            type_name = %envelope.type_name,
            receive_count = envelope.receive_count,
        );

        async {
            let result = match self.registry.get(&envelope.type_name) {
                Some(binding) => {
                    let ctx = DispatchContext::new(&envelope, token.child_token());
                    let outcome = tokio::select! {
                        outcome = AssertUnwindSafe(binding.dispatch(ctx, &envelope)).catch_unwind() => outcome,
                        _ = token.cancelled() => {
                            self.acks.settle(&envelope.id, &envelope.receipt);
                            info!("Shutdown during dispatch; message left for redelivery");
                            return;
                        }
                    };
                    outcome.unwrap_or_else(|panic| {
                        Err(DispatchError::Panicked {
                            message: panic_message(panic.as_ref()),
                        })
                    })
                }
                None => Err(DispatchError::UnregisteredType {
                    type_name: envelope.type_name.clone(),
                }),
            };

            match result {
                Ok(()) => self.acknowledge(&envelope, token).await,
                Err(e) => {
                    self.acks.settle(&envelope.id, &envelope.receipt);
                    if matches!(e, DispatchError::Panicked { .. }) {
                        error!(error = %e, "Handler panicked; message left for redelivery");
                    } else {
                        warn!(error = %e, "Dispatch failed; message left for redelivery");
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Delete a successfully handled message using the receipt of the
    /// delivery that was handled.
    ///
    /// The ack record is settled whether or not the delete succeeds. A failed
    /// delete means the message comes back and is handled a second time.
    async fn acknowledge(&self, envelope: &WireEnvelope, token: &CancellationToken) {
        let deleted = tokio::select! {
            deleted = self.client.delete_message(&self.queue, &envelope.receipt) => Some(deleted),
            _ = token.cancelled() => None,
        };
        self.acks.settle(&envelope.id, &envelope.receipt);

        match deleted {
            Some(Ok(())) => debug!("Message acknowledged"),
            Some(Err(e)) => {
                warn!(error = %e, "Failed to delete handled message; it will be redelivered")
            }
            None => info!("Shutdown during acknowledgement; message will be redelivered"),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
