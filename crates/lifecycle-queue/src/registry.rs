//! Handler registration and the per-message dispatch context.
//!
//! The registry maps a message type name to a binding that knows how to decode
//! the payload into the concrete type and invoke the handler with it. It is
//! built once before the consumer starts and only read afterwards.

use crate::codec::{decode_payload, QueueMessage, WireEnvelope};
use crate::error::{DispatchError, HandlerError};
use crate::headers::{HeaderMap, HeaderValue};
use crate::message::MessageId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ============================================================================
// DispatchContext
// ============================================================================

/// Per-message context handed to a handler.
///
/// Created fresh for every dispatch and dropped once the handler returns.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    message_id: MessageId,
    type_name: String,
    headers: HeaderMap,
    receive_count: u32,
    cancellation: CancellationToken,
}

impl DispatchContext {
    pub fn new(envelope: &WireEnvelope, cancellation: CancellationToken) -> Self {
        Self {
            message_id: envelope.id.clone(),
            type_name: envelope.type_name.clone(),
            headers: envelope.headers.clone(),
            receive_count: envelope.receive_count,
            cancellation,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Approximate number of deliveries of this message, starting at 1
    pub fn receive_count(&self) -> u32 {
        self.receive_count
    }

    /// Token cancelled when the consumer shuts down
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

// ============================================================================
// MessageHandler
// ============================================================================

/// Application-provided handler for one message type.
///
/// Returning `Ok(())` acknowledges the message. Returning an error, or
/// panicking, leaves it on the queue for redelivery after the visibility
/// timeout, so handlers must be idempotent.
///
/// Async closures of the form `|ctx, message| async move { ... }` implement
/// this trait; register them with [`HandlerRegistry::register_fn`].
#[async_trait]
pub trait MessageHandler<M: QueueMessage>: Send + Sync + 'static {
    async fn handle(&self, ctx: DispatchContext, message: M) -> Result<(), HandlerError>;
}

#[async_trait]
impl<M, F, Fut> MessageHandler<M> for F
where
    M: QueueMessage,
    F: Fn(DispatchContext, M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, ctx: DispatchContext, message: M) -> Result<(), HandlerError> {
        (self)(ctx, message).await
    }
}

/// Type-erased handler: decodes the payload for its own message type and runs
/// the typed handler.
#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn dispatch(
        &self,
        ctx: DispatchContext,
        envelope: &WireEnvelope,
    ) -> Result<(), DispatchError>;
}

struct TypedHandler<M, H> {
    handler: H,
    _message: PhantomData<fn() -> M>,
}

#[async_trait]
impl<M, H> ErasedHandler for TypedHandler<M, H>
where
    M: QueueMessage,
    H: MessageHandler<M>,
{
    async fn dispatch(
        &self,
        ctx: DispatchContext,
        envelope: &WireEnvelope,
    ) -> Result<(), DispatchError> {
        let message = decode_payload::<M>(envelope)?;
        self.handler
            .handle(ctx, message)
            .await
            .map_err(DispatchError::Handler)
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// A registered `(type name, decoder, handler)` triple
#[derive(Clone)]
pub struct HandlerBinding {
    type_name: &'static str,
    handler: Arc<dyn ErasedHandler>,
}

impl HandlerBinding {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Decode the envelope payload and run the handler
    pub async fn dispatch(
        &self,
        ctx: DispatchContext,
        envelope: &WireEnvelope,
    ) -> Result<(), DispatchError> {
        self.handler.dispatch(ctx, envelope).await
    }
}

impl std::fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Registry mapping message type names to their handlers.
///
/// Registering a second handler for a type replaces the first: the last
/// registration wins and only that handler is ever dispatched to.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    bindings: HashMap<String, HandlerBinding>,
}

impl HandlerRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for message type `M`.
    ///
    /// Returns `&mut Self` to allow method chaining.
    pub fn register<M, H>(&mut self, handler: H) -> &mut Self
    where
        M: QueueMessage,
        H: MessageHandler<M>,
    {
        let type_name = M::type_name();
        let binding = HandlerBinding {
            type_name,
            handler: Arc::new(TypedHandler {
                handler,
                _message: PhantomData,
            }),
        };

        if self.bindings.insert(type_name.to_string(), binding).is_some() {
            debug!(type_name, "Replaced previously registered handler");
        }
        self
    }

    /// Register an async closure as the handler for message type `M`.
    pub fn register_fn<M, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        M: QueueMessage,
        F: Fn(DispatchContext, M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register::<M, F>(handler)
    }

    /// Look up the binding for a type name.
    pub fn get(&self, type_name: &str) -> Option<&HandlerBinding> {
        self.bindings.get(type_name)
    }

    /// Check whether a handler is registered for a type name.
    pub fn contains(&self, type_name: &str) -> bool {
        self.bindings.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
