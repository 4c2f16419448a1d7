//! Tests for the in-memory queue backend.

use super::*;

fn queue_name(name: &str) -> QueueName {
    QueueName::new(name.to_string()).unwrap()
}

fn immediate(visibility: Duration) -> ReceiveOptions {
    ReceiveOptions::new()
        .with_wait_time(Duration::ZERO)
        .with_visibility_timeout(visibility)
}

mod queue_management {
    use super::*;

    #[tokio::test]
    async fn test_resolve_created_queue() {
        let client = InMemoryQueueClient::new();
        let created = client.create_queue(queue_name("domain-events"));

        let resolved = client
            .get_queue_url(&QueueLocator::new(queue_name("domain-events")))
            .await
            .unwrap();

        assert_eq!(resolved, created);
        assert_eq!(resolved.url(), "memory://local/domain-events");
    }

    #[tokio::test]
    async fn test_resolve_unknown_queue_fails() {
        let client = InMemoryQueueClient::new();

        let result = client
            .get_queue_url(&QueueLocator::new(queue_name("missing")))
            .await;

        assert!(matches!(result, Err(QueueError::QueueNotFound { .. })));
    }

    #[tokio::test]
    async fn test_owner_account_qualifies_queue() {
        let client = InMemoryQueueClient::new();
        let locator = QueueLocator::new(queue_name("shared")).with_owner_account("210987654321");
        client.create_queue_at(locator.clone());

        assert!(client.get_queue_url(&locator).await.is_ok());
        assert!(client
            .get_queue_url(&QueueLocator::new(queue_name("shared")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_clones_share_queues() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("shared"));
        let other = client.clone();

        other
            .send_message(&queue, OutboundMessage::new("x"))
            .await
            .unwrap();

        assert_eq!(client.message_count(&queue), 1);
    }
}

mod delivery {
    use super::*;

    #[tokio::test]
    async fn test_send_then_receive_preserves_attributes() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        let message = OutboundMessage::new("envelope").with_attribute(
            "body",
            AttributeValue::Binary(bytes::Bytes::from_static(b"{}")),
        );

        let id = client.send_message(&queue, message).await.unwrap();
        let received = client
            .receive_messages(&queue, &immediate(Duration::from_secs(30)))
            .await
            .unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message_id, id);
        assert_eq!(received[0].body, "envelope");
        assert_eq!(received[0].receive_count, 1);
        assert!(received[0].attributes.contains_key("body"));
    }

    #[tokio::test]
    async fn test_receive_respects_max_messages() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        for n in 0..5 {
            client
                .send_message(&queue, OutboundMessage::new(n.to_string()))
                .await
                .unwrap();
        }

        let received = client
            .receive_messages(&queue, &immediate(Duration::from_secs(30)).with_max_messages(3))
            .await
            .unwrap();

        assert_eq!(received.len(), 3);
        assert_eq!(received[0].body, "0");
    }

    #[tokio::test]
    async fn test_received_message_is_hidden_until_visibility_expires() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        client
            .send_message(&queue, OutboundMessage::new("x"))
            .await
            .unwrap();
        let options = immediate(Duration::from_millis(50));

        let first = client.receive_messages(&queue, &options).await.unwrap();
        let hidden = client.receive_messages(&queue, &options).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(hidden.is_empty());
        assert_eq!(client.in_flight_count(&queue), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let again = client.receive_messages(&queue, &options).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].message_id, first[0].message_id);
        assert_eq!(again[0].receive_count, 2);
        assert_ne!(again[0].receipt_handle, first[0].receipt_handle);
    }

    #[tokio::test]
    async fn test_delete_acknowledges_message() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        client
            .send_message(&queue, OutboundMessage::new("x"))
            .await
            .unwrap();
        let options = immediate(Duration::from_millis(20));

        let received = client.receive_messages(&queue, &options).await.unwrap();
        client
            .delete_message(&queue, &received[0].receipt_handle)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(client
            .receive_messages(&queue, &options)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(client.message_count(&queue), 0);
        assert_eq!(client.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_receipt_does_not_delete() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        client
            .send_message(&queue, OutboundMessage::new("x"))
            .await
            .unwrap();
        let options = immediate(Duration::from_millis(20));

        let first = client.receive_messages(&queue, &options).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let _second = client.receive_messages(&queue, &options).await.unwrap();

        let result = client
            .delete_message(&queue, &first[0].receipt_handle)
            .await;

        assert!(matches!(result, Err(QueueError::MessageNotFound { .. })));
        assert_eq!(client.message_count(&queue), 1);
    }

    #[tokio::test]
    async fn test_long_poll_returns_message_sent_while_waiting() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        let sender = client.clone();
        let target = queue.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            sender
                .send_message(&target, OutboundMessage::new("late"))
                .await
                .unwrap();
        });

        let options = ReceiveOptions::new().with_wait_time(Duration::from_secs(2));
        let received = client.receive_messages(&queue, &options).await.unwrap();

        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "late");
    }

    #[tokio::test]
    async fn test_long_poll_gives_up_after_wait_time() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        let options = ReceiveOptions::new().with_wait_time(Duration::from_millis(30));

        let started = std::time::Instant::now();
        let received = client.receive_messages(&queue, &options).await.unwrap();

        assert!(received.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        let message = OutboundMessage::new("x".repeat(MAX_MESSAGE_SIZE + 1));

        let result = client.send_message(&queue, message).await;

        assert!(matches!(result, Err(QueueError::MessageTooLarge { .. })));
    }
}

mod fifo {
    use super::*;

    fn grouped(body: &str, group: &str, dedup: &str) -> OutboundMessage {
        OutboundMessage::new(body)
            .with_group_id(group)
            .with_deduplication_id(dedup)
    }

    #[tokio::test]
    async fn test_duplicate_deduplication_id_is_suppressed() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events.fifo"));

        let first = client
            .send_message(&queue, grouped("a", "g", "dedup-1"))
            .await
            .unwrap();
        let second = client
            .send_message(&queue, grouped("a", "g", "dedup-1"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(client.message_count(&queue), 1);
        assert_eq!(client.send_calls(), 2);
    }

    #[tokio::test]
    async fn test_distinct_deduplication_ids_are_both_delivered() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events.fifo"));

        client
            .send_message(&queue, grouped("a", "g", "dedup-1"))
            .await
            .unwrap();
        client
            .send_message(&queue, grouped("a", "g", "dedup-2"))
            .await
            .unwrap();

        assert_eq!(client.message_count(&queue), 2);
    }

    #[tokio::test]
    async fn test_group_id_is_required() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events.fifo"));

        let result = client.send_message(&queue, OutboundMessage::new("a")).await;

        assert!(matches!(result, Err(QueueError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_group_blocks_while_message_in_flight() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events.fifo"));
        client
            .send_message(&queue, grouped("a1", "a", "1"))
            .await
            .unwrap();
        client
            .send_message(&queue, grouped("a2", "a", "2"))
            .await
            .unwrap();
        client
            .send_message(&queue, grouped("b1", "b", "3"))
            .await
            .unwrap();
        let options = immediate(Duration::from_secs(30)).with_max_messages(1);

        let first = client.receive_messages(&queue, &options).await.unwrap();
        let second = client.receive_messages(&queue, &options).await.unwrap();
        let third = client.receive_messages(&queue, &options).await.unwrap();

        assert_eq!(first[0].body, "a1");
        assert_eq!(second[0].body, "b1");
        assert!(third.is_empty());

        client
            .delete_message(&queue, &first[0].receipt_handle)
            .await
            .unwrap();
        let fourth = client.receive_messages(&queue, &options).await.unwrap();
        assert_eq!(fourth[0].body, "a2");
    }

    #[tokio::test]
    async fn test_standard_queue_ignores_deduplication_id() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));

        client
            .send_message(&queue, OutboundMessage::new("a").with_deduplication_id("same"))
            .await
            .unwrap();
        client
            .send_message(&queue, OutboundMessage::new("a").with_deduplication_id("same"))
            .await
            .unwrap();

        assert_eq!(client.message_count(&queue), 2);
    }
}

mod fault_injection {
    use super::*;

    #[tokio::test]
    async fn test_receive_faults_are_consumed_in_order() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        client.fail_next_receives(2);
        let options = immediate(Duration::from_secs(30));

        assert!(client.receive_messages(&queue, &options).await.is_err());
        assert!(client.receive_messages(&queue, &options).await.is_err());
        assert!(client.receive_messages(&queue, &options).await.is_ok());
        assert_eq!(client.receive_calls(), 3);
    }

    #[tokio::test]
    async fn test_delete_fault_keeps_message() {
        let client = InMemoryQueueClient::new();
        let queue = client.create_queue(queue_name("events"));
        client
            .send_message(&queue, OutboundMessage::new("x"))
            .await
            .unwrap();
        let received = client
            .receive_messages(&queue, &immediate(Duration::from_secs(30)))
            .await
            .unwrap();
        client.fail_next_deletes(1);

        let result = client
            .delete_message(&queue, &received[0].receipt_handle)
            .await;

        assert!(matches!(result, Err(QueueError::ConnectionFailed { .. })));
        assert_eq!(client.message_count(&queue), 1);
    }

    #[tokio::test]
    async fn test_resolve_fault() {
        let client = InMemoryQueueClient::new();
        client.create_queue(queue_name("events"));
        client.fail_next_resolves(1);
        let locator = QueueLocator::new(queue_name("events"));

        assert!(client.get_queue_url(&locator).await.is_err());
        assert!(client.get_queue_url(&locator).await.is_ok());
    }
}
