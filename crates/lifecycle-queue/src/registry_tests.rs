//! Tests for the handler registry.

use super::*;
use crate::codec::encode_payload;
use crate::message::ReceiptHandle;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DomainRegistered {
    domain: String,
}

impl QueueMessage for DomainRegistered {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CertificateIssued {
    domain: String,
    serial: u64,
}

impl QueueMessage for CertificateIssued {}

fn envelope_for<M: QueueMessage>(message: &M) -> WireEnvelope {
    WireEnvelope {
        id: MessageId::new(),
        receipt: ReceiptHandle::new("receipt-1"),
        type_name: M::type_name().to_string(),
        headers: HeaderMap::new(),
        payload: encode_payload(message).unwrap(),
        receive_count: 1,
    }
}

fn context_for(envelope: &WireEnvelope) -> DispatchContext {
    DispatchContext::new(envelope, CancellationToken::new())
}

/// Handler counting its invocations.
struct Counting {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MessageHandler<DomainRegistered> for Counting {
    async fn handle(
        &self,
        _ctx: DispatchContext,
        _message: DomainRegistered,
    ) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_new_registry_is_empty() {
    let registry = HandlerRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.get("DomainRegistered").is_none());
}

#[test]
fn test_register_keys_by_type_name() {
    let mut registry = HandlerRegistry::new();
    registry
        .register_fn(|_ctx, _msg: DomainRegistered| async { Ok::<(), HandlerError>(()) })
        .register_fn(|_ctx, _msg: CertificateIssued| async { Ok::<(), HandlerError>(()) });

    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.type_names(),
        vec!["CertificateIssued", "DomainRegistered"]
    );
    assert_eq!(
        registry.get("DomainRegistered").unwrap().type_name(),
        "DomainRegistered"
    );
}

#[tokio::test]
async fn test_dispatch_decodes_payload_for_handler() {
    let seen = Arc::new(std::sync::Mutex::new(None));
    let captured = Arc::clone(&seen);

    let mut registry = HandlerRegistry::new();
    registry.register_fn(move |ctx: DispatchContext, msg: CertificateIssued| {
        let captured = Arc::clone(&captured);
        async move {
            assert_eq!(ctx.type_name(), "CertificateIssued");
            *captured.lock().unwrap() = Some(msg);
            Ok::<(), HandlerError>(())
        }
    });

    let message = CertificateIssued {
        domain: "example.org".to_string(),
        serial: 42,
    };
    let envelope = envelope_for(&message);

    registry
        .get(&envelope.type_name)
        .unwrap()
        .dispatch(context_for(&envelope), &envelope)
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().clone(), Some(message));
}

#[tokio::test]
async fn test_second_registration_replaces_first() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let mut registry = HandlerRegistry::new();
    registry.register::<DomainRegistered, _>(Counting {
        calls: Arc::clone(&first),
    });
    registry.register::<DomainRegistered, _>(Counting {
        calls: Arc::clone(&second),
    });
    assert_eq!(registry.len(), 1);

    let envelope = envelope_for(&DomainRegistered {
        domain: "example.com".to_string(),
    });
    registry
        .get(&envelope.type_name)
        .unwrap()
        .dispatch(context_for(&envelope), &envelope)
        .await
        .unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_handler_error_is_reported() {
    let mut registry = HandlerRegistry::new();
    registry.register_fn(|_ctx, _msg: DomainRegistered| async {
        Err::<(), HandlerError>("registrar unavailable".into())
    });

    let envelope = envelope_for(&DomainRegistered {
        domain: "example.net".to_string(),
    });
    let result = registry
        .get(&envelope.type_name)
        .unwrap()
        .dispatch(context_for(&envelope), &envelope)
        .await;

    assert!(matches!(result, Err(DispatchError::Handler(_))));
}

#[tokio::test]
async fn test_payload_mismatch_is_a_decode_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    registry.register::<DomainRegistered, _>(Counting {
        calls: Arc::clone(&calls),
    });

    // A certificate payload delivered under the wrong type tag
    let mut envelope = envelope_for(&CertificateIssued {
        domain: "example.io".to_string(),
        serial: 7,
    });
    envelope.type_name = "DomainRegistered".to_string();
    envelope.payload = bytes::Bytes::from_static(br#"{"@type":"DomainRegistered","value":{}}"#);

    let result = registry
        .get(&envelope.type_name)
        .unwrap()
        .dispatch(context_for(&envelope), &envelope)
        .await;

    assert!(matches!(result, Err(DispatchError::Decode(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_context_exposes_envelope_metadata() {
    let mut envelope = envelope_for(&DomainRegistered {
        domain: "example.com".to_string(),
    });
    envelope
        .headers
        .insert("tenant".to_string(), HeaderValue::from("acme"));
    envelope.receive_count = 3;

    let token = CancellationToken::new();
    let ctx = DispatchContext::new(&envelope, token.child_token());

    assert_eq!(ctx.message_id(), &envelope.id);
    assert_eq!(ctx.header("tenant"), Some(&HeaderValue::from("acme")));
    assert_eq!(ctx.receive_count(), 3);
    assert!(!ctx.is_cancelled());

    token.cancel();
    assert!(ctx.is_cancelled());
}
