//! Queue backend implementations.
//!
//! This module contains concrete implementations of the `QueueClient` trait
//! for the backends the worker can run against.

pub mod memory;
pub mod sqs;

pub use memory::InMemoryQueueClient;
pub use sqs::SqsQueueClient;
