//! # Lifecycle Queue
//!
//! Reliable queue consumption and publishing for lifecycle event workers.
//!
//! This library provides:
//! - A narrow queue backend abstraction with SQS and in-memory implementations
//! - A self-describing wire envelope with typed headers
//! - A handler registry keyed by message type name
//! - A publisher attaching FIFO group and deduplication ids
//! - A consumer running a bounded poll → decode → dispatch pipeline with
//!   at-least-once delivery and contained handler failures
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for backend, codec and dispatch failures
//! - [`message`] - Queue identifiers, attributes and raw messages
//! - [`client`] - The `QueueClient` backend trait
//! - [`providers`] - SQS and in-memory backends
//! - [`headers`] - Typed header map and its attribute encoding
//! - [`codec`] - Wire envelope encoding and decoding
//! - [`registry`] - Handler registration and dispatch context
//! - [`ack`] - In-flight acknowledgement tracking
//! - [`config`] - Consumer and publisher configuration
//! - [`publisher`] - Typed message publishing
//! - [`consumer`] - The consumption pipeline

pub mod ack;
pub mod client;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod headers;
pub mod message;
pub mod providers;
pub mod publisher;
pub mod registry;

// Re-export commonly used types at crate root for convenience
pub use client::QueueClient;
pub use codec::{QueueMessage, WireEnvelope};
pub use config::{ConsumerConfig, PublisherConfig};
pub use consumer::Consumer;
pub use error::{
    CodecError, ConfigurationError, DispatchError, HandlerError, QueueError, ValidationError,
};
pub use headers::{HeaderMap, HeaderValue};
pub use message::{
    AttributeValue, MessageId, OutboundMessage, QueueIdentity, QueueLocator, QueueName,
    ReceiptHandle, ReceiveOptions, ReceivedMessage,
};
pub use providers::{InMemoryQueueClient, SqsQueueClient};
pub use publisher::{Publisher, SendOptions};
pub use registry::{DispatchContext, HandlerRegistry, MessageHandler};

pub use tokio_util::sync::CancellationToken;
