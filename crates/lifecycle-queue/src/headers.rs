//! Typed message headers and their wire-attribute encoding.
//!
//! Headers travel in a single binary attribute holding a JSON object of
//! header name to tagged value, so typed values (numbers, booleans, raw bytes,
//! timestamps) survive the round trip instead of being flattened to text.

use crate::error::CodecError;
use crate::message::AttributeValue;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header name to typed value. Ordering carries no meaning.
pub type HeaderMap = BTreeMap<String, HeaderValue>;

/// A typed header value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HeaderValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(#[serde(with = "bytes_serde")] Bytes),
    Timestamp(DateTime<Utc>),
}

impl HeaderValue {
    /// The value as text, if it is a string header
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Bytes> for HeaderValue {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<DateTime<Utc>> for HeaderValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Custom serialization for Bytes
mod bytes_serde {
    use base64::{engine::general_purpose, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = general_purpose::STANDARD.encode(bytes);
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

/// Encode a header map into its wire attribute
pub fn encode_headers(headers: &HeaderMap) -> Result<AttributeValue, CodecError> {
    let encoded = serde_json::to_vec(headers).map_err(CodecError::Encode)?;
    Ok(AttributeValue::Binary(Bytes::from(encoded)))
}

/// Decode a header attribute back into a header map.
///
/// An absent attribute decodes to an empty map.
pub fn decode_headers(attribute: Option<&AttributeValue>) -> Result<HeaderMap, CodecError> {
    let Some(attribute) = attribute else {
        return Ok(HeaderMap::new());
    };

    let bytes = attribute
        .as_binary()
        .ok_or_else(|| CodecError::UnexpectedDataType {
            attribute: crate::codec::HEADERS_ATTRIBUTE.to_string(),
            expected: "Binary",
            found: attribute.data_type().to_string(),
        })?;

    serde_json::from_slice(bytes).map_err(CodecError::InvalidHeaders)
}

#[cfg(test)]
#[path = "headers_tests.rs"]
mod tests;
