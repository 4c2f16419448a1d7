//! Wire envelope codec.
//!
//! A message travels entirely in attributes; the primary body only carries a
//! placeholder so it stays routable by the backend.
//!
//! | attribute | data type | content                                               |
//! |-----------|-----------|-------------------------------------------------------|
//! | `body`    | Binary    | payload frame `{"@type": <type name>, "value": <msg>}` |
//! | `type`    | String    | optional explicit type tag, preferred when present    |
//! | `headers` | Binary    | optional typed header map, see [`crate::headers`]     |

use crate::error::CodecError;
use crate::headers::{decode_headers, encode_headers, HeaderMap};
use crate::message::{
    AttributeValue, MessageId, OutboundMessage, ReceiptHandle, ReceivedMessage,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Attribute carrying the binary payload frame
pub const PAYLOAD_ATTRIBUTE: &str = "body";

/// Attribute carrying the explicit type tag
pub const TYPE_ATTRIBUTE: &str = "type";

/// Attribute carrying the encoded header map
pub const HEADERS_ATTRIBUTE: &str = "headers";

/// Primary body sent with every message
pub const PLACEHOLDER_BODY: &str = "envelope";

/// A message type that can travel through the queue.
///
/// The type name is the discriminator used to find the registered handler. By
/// default it is derived from the Rust type itself, so registration order and
/// process layout never influence it.
pub trait QueueMessage: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Discriminator identifying this message type on the wire
    fn type_name() -> &'static str {
        short_type_name::<Self>()
    }

    /// Business key used as the FIFO message group, if any
    fn group_key(&self) -> Option<String> {
        None
    }
}

/// Last path segment of a type's name, with generic arguments stripped.
///
/// `billing::events::OrderStatusUpdate` becomes `OrderStatusUpdate`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// The structured, in-flight representation of one received message
#[derive(Debug, Clone)]
pub struct WireEnvelope {
    /// Backend delivery identifier
    pub id: MessageId,
    /// Receipt of this particular delivery
    pub receipt: ReceiptHandle,
    pub type_name: String,
    pub headers: HeaderMap,
    /// Payload frame, decodable only by the holder of `type_name`
    pub payload: Bytes,
    pub receive_count: u32,
}

#[derive(Serialize)]
struct FrameRef<'a, M> {
    #[serde(rename = "@type")]
    type_name: &'a str,
    value: &'a M,
}

#[derive(Deserialize)]
struct FrameTag {
    #[serde(rename = "@type")]
    type_name: String,
}

#[derive(Deserialize)]
struct Frame<M> {
    value: M,
}

/// Serialize a typed message into its self-describing payload frame
pub fn encode_payload<M: QueueMessage>(message: &M) -> Result<Bytes, CodecError> {
    let frame = FrameRef {
        type_name: M::type_name(),
        value: message,
    };
    serde_json::to_vec(&frame)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

/// Decode the payload frame of an envelope into its typed message
pub fn decode_payload<M: QueueMessage>(envelope: &WireEnvelope) -> Result<M, CodecError> {
    serde_json::from_slice::<Frame<M>>(&envelope.payload)
        .map(|frame| frame.value)
        .map_err(|source| CodecError::InvalidPayload {
            type_name: envelope.type_name.clone(),
            source,
        })
}

/// Build the outbound envelope for a typed message.
///
/// The header attribute is only written when there are headers to carry. Group
/// and deduplication ids are left for the sender to fill in.
pub fn encode<M: QueueMessage>(
    message: &M,
    headers: &HeaderMap,
) -> Result<OutboundMessage, CodecError> {
    let mut outbound = OutboundMessage::new(PLACEHOLDER_BODY)
        .with_attribute(
            PAYLOAD_ATTRIBUTE,
            AttributeValue::Binary(encode_payload(message)?),
        )
        .with_attribute(
            TYPE_ATTRIBUTE,
            AttributeValue::String(M::type_name().to_string()),
        );

    if !headers.is_empty() {
        outbound = outbound.with_attribute(HEADERS_ATTRIBUTE, encode_headers(headers)?);
    }
    Ok(outbound)
}

/// Turn a raw backend message into a wire envelope.
///
/// Fails when the payload attribute is absent or not binary, when neither an
/// explicit type tag nor the payload frame names the type, or when the header
/// attribute cannot be decoded. An absent header attribute is not an error.
pub fn decode(raw: &ReceivedMessage) -> Result<WireEnvelope, CodecError> {
    let payload_attribute =
        raw.attributes
            .get(PAYLOAD_ATTRIBUTE)
            .ok_or(CodecError::MissingPayload {
                attribute: PAYLOAD_ATTRIBUTE,
            })?;
    let payload = payload_attribute
        .as_binary()
        .cloned()
        .ok_or_else(|| CodecError::UnexpectedDataType {
            attribute: PAYLOAD_ATTRIBUTE.to_string(),
            expected: "Binary",
            found: payload_attribute.data_type().to_string(),
        })?;

    let type_name = match raw.attributes.get(TYPE_ATTRIBUTE) {
        Some(AttributeValue::String(tag)) if !tag.is_empty() => tag.clone(),
        _ => {
            serde_json::from_slice::<FrameTag>(&payload)
                .map_err(CodecError::MissingTypeTag)?
                .type_name
        }
    };

    let headers = decode_headers(raw.attributes.get(HEADERS_ATTRIBUTE))?;

    Ok(WireEnvelope {
        id: raw.message_id.clone(),
        receipt: raw.receipt_handle.clone(),
        type_name,
        headers,
        payload,
        receive_count: raw.receive_count,
    })
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
