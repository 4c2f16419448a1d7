//! Integration tests for publishing to FIFO queues
//!
//! These tests verify:
//! - Deduplication ids are generated per call, not derived from content
//! - Explicit deduplication ids collapse duplicate sends
//! - Business keys select the message group

mod common;

use common::{queue_name, OrderStatusUpdate};
use lifecycle_queue::codec::decode;
use lifecycle_queue::{
    InMemoryQueueClient, Publisher, PublisherConfig, QueueClient, QueueIdentity, ReceiveOptions,
    SendOptions,
};
use std::sync::Arc;
use std::time::Duration;

const FIFO_QUEUE: &str = "order-status.fifo";

async fn fifo_publisher() -> (InMemoryQueueClient, QueueIdentity, Publisher) {
    let client = InMemoryQueueClient::new();
    let queue = client.create_queue(queue_name(FIFO_QUEUE));
    let publisher = Publisher::new(
        Arc::new(client.clone()),
        PublisherConfig::new(queue_name(FIFO_QUEUE)),
    )
    .await
    .expect("publisher");
    (client, queue, publisher)
}

fn immediate() -> ReceiveOptions {
    ReceiveOptions::new().with_wait_time(Duration::ZERO)
}

/// Verify two sends of the same message are both delivered
#[tokio::test]
async fn test_identical_sends_are_not_deduplicated_by_default() {
    let (client, queue, publisher) = fifo_publisher().await;
    let update = OrderStatusUpdate::completed("o1");

    let first = publisher.send(&update).await.expect("first send");
    let second = publisher.send(&update).await.expect("second send");

    assert_ne!(first, second);
    assert_eq!(client.message_count(&queue), 2);
}

/// Verify a repeated explicit deduplication id is suppressed
#[tokio::test]
async fn test_explicit_deduplication_id_collapses_sends() {
    let (client, queue, publisher) = fifo_publisher().await;
    let update = OrderStatusUpdate::completed("o2");

    for _ in 0..3 {
        tokio_test::assert_ok!(
            publisher
                .send_with(
                    &update,
                    SendOptions::new().with_deduplication_id("order-o2-completed"),
                )
                .await
        );
    }

    assert_eq!(client.message_count(&queue), 1);
}

/// Verify messages sharing a business key are delivered one at a time
#[tokio::test]
async fn test_business_key_orders_delivery_within_group() {
    let (client, queue, publisher) = fifo_publisher().await;
    publisher
        .send(&OrderStatusUpdate {
            id: "o3".to_string(),
            status: "processing".to_string(),
        })
        .await
        .expect("send");
    publisher
        .send(&OrderStatusUpdate::completed("o3"))
        .await
        .expect("send");
    publisher
        .send(&OrderStatusUpdate::completed("o4"))
        .await
        .expect("send");

    let batch = client
        .receive_messages(&queue, &immediate())
        .await
        .expect("receive");

    let statuses: Vec<(String, String)> = batch
        .iter()
        .map(|raw| {
            let envelope = decode(raw).expect("decode");
            let update: OrderStatusUpdate =
                lifecycle_queue::codec::decode_payload(&envelope).expect("payload");
            (update.id, update.status)
        })
        .collect();

    assert_eq!(
        statuses,
        vec![
            ("o3".to_string(), "processing".to_string()),
            ("o4".to_string(), "completed".to_string()),
        ],
        "the second o3 update waits for the first to be deleted"
    );
}
