//! Common test utilities for lifecycle-queue integration tests
//!
//! This module provides:
//! - Message types used across the pipeline tests
//! - A running consumer/publisher pair over the in-memory backend
//! - Polling helpers for asynchronous assertions

#![allow(dead_code)]

use lifecycle_queue::{
    CancellationToken, Consumer, ConsumerConfig, HandlerRegistry, InMemoryQueueClient,
    Publisher, PublisherConfig, QueueIdentity, QueueMessage, QueueName,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const EVENTS_QUEUE: &str = "lifecycle-events";

// ============================================================================
// Message types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub id: String,
    pub status: String,
}

impl QueueMessage for OrderStatusUpdate {
    fn group_key(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

impl OrderStatusUpdate {
    pub fn completed(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "completed".to_string(),
        }
    }
}

/// Message whose handler always panics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoisonPill {
    pub reason: String,
}

impl QueueMessage for PoisonPill {}

// ============================================================================
// Pipeline fixture
// ============================================================================

pub fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).expect("valid queue name")
}

/// Consumer settings suited to fast tests: short polls, small pool
pub fn fast_consumer_config() -> ConsumerConfig {
    ConsumerConfig::new(queue_name(EVENTS_QUEUE))
        .with_worker_count(2)
        .with_wait_time_secs(0)
        .with_empty_poll_delay_ms(5)
        .with_visibility_timeout_secs(1)
}

/// A publisher and a running consumer sharing one in-memory queue
pub struct Pipeline {
    pub client: InMemoryQueueClient,
    pub queue: QueueIdentity,
    pub publisher: Publisher,
    pub consumer: Consumer,
    token: CancellationToken,
    running: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub async fn start(registry: HandlerRegistry) -> Self {
        Self::start_with(registry, fast_consumer_config()).await
    }

    pub async fn start_with(registry: HandlerRegistry, config: ConsumerConfig) -> Self {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(config.queue_name.clone());

        let publisher = Publisher::new(
            Arc::new(client.clone()),
            PublisherConfig::new(config.queue_name.clone()),
        )
        .await
        .expect("publisher");
        let consumer = Consumer::new(Arc::new(client.clone()), registry, config)
            .await
            .expect("consumer");

        let token = CancellationToken::new();
        let running = tokio::spawn({
            let consumer = consumer.clone();
            let token = token.clone();
            async move { consumer.run(token).await }
        });

        Self {
            client,
            queue,
            publisher,
            consumer,
            token,
            running: Some(running),
        }
    }

    /// Cancel the consumer and wait for it to stop
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(running) = self.running.take() {
            tokio::time::timeout(Duration::from_secs(5), running)
                .await
                .expect("consumer stops after cancellation")
                .expect("consumer task");
        }
    }
}

/// Poll `condition` until it holds or five seconds pass
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
