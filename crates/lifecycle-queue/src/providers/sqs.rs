//! AWS SQS backend built on the official SDK.
//!
//! The client is injected already authenticated: credential chains, role
//! assumption and region selection belong to whoever builds the SDK client.
//! [`SqsQueueClient::from_env`] covers the common case of the default
//! provider chain with an optional region and endpoint override (for local
//! emulators).
//!
//! Typed attributes map one to one onto SQS message attributes, so the wire
//! envelope reaches the queue unchanged. Error codes are folded into
//! [`QueueError`]:
//!
//! | SQS error code                                                   | QueueError         |
//! |------------------------------------------------------------------|--------------------|
//! | `AWS.SimpleQueueService.NonExistentQueue`, `QueueDoesNotExist`    | `QueueNotFound`    |
//! | `ReceiptHandleIsInvalid`                                         | `MessageNotFound`  |
//! | credential / signature errors                                     | `AuthenticationFailed` |
//! | any other code                                                   | `ProviderError`    |
//! | no code (dispatch, timeout, response errors)                      | `ConnectionFailed` |

use crate::client::QueueClient;
use crate::error::QueueError;
use crate::message::{
    AttributeValue, MessageId, OutboundMessage, QueueIdentity, QueueLocator, ReceiptHandle,
    ReceiveOptions, ReceivedMessage, MAX_MESSAGE_SIZE,
};
use async_trait::async_trait;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_sqs::primitives::Blob;
use aws_sdk_sqs::types::{Message, MessageAttributeValue, MessageSystemAttributeName};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument, warn};

const PROVIDER: &str = "AwsSqs";

const QUEUE_NOT_FOUND_CODES: &[&str] = &[
    "AWS.SimpleQueueService.NonExistentQueue",
    "QueueDoesNotExist",
];

const INVALID_RECEIPT_CODES: &[&str] = &["ReceiptHandleIsInvalid"];

const AUTHENTICATION_CODES: &[&str] = &[
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "UnrecognizedClientException",
];

/// [`QueueClient`] backed by Amazon SQS
#[derive(Clone)]
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueClient {
    /// Wrap an already configured SDK client
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS provider chain.
    ///
    /// `region` and `endpoint_url` override what the environment provides.
    pub async fn from_env(region: Option<String>, endpoint_url: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint_url) = endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        let config = loader.load().await;
        Self::new(aws_sdk_sqs::Client::new(&config))
    }
}

impl fmt::Debug for SqsQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsQueueClient")
            .field("region", &self.client.config().region())
            .finish()
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    #[instrument(skip(self), fields(queue = %locator))]
    async fn get_queue_url(&self, locator: &QueueLocator) -> Result<QueueIdentity, QueueError> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(locator.name.as_str())
            .set_queue_owner_aws_account_id(locator.owner_account.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &locator.to_string()))?;

        let url = output
            .queue_url()
            .ok_or_else(|| missing_field("GetQueueUrl", "QueueUrl"))?;
        debug!(url, "Resolved queue");
        Ok(QueueIdentity::new(locator.name.clone(), url))
    }

    async fn send_message(
        &self,
        queue: &QueueIdentity,
        message: OutboundMessage,
    ) -> Result<MessageId, QueueError> {
        let size = message.size();
        if size > MAX_MESSAGE_SIZE {
            return Err(QueueError::MessageTooLarge {
                size,
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        let attributes = message
            .attributes
            .iter()
            .map(|(name, value)| Ok((name.clone(), to_sqs_attribute(value)?)))
            .collect::<Result<HashMap<_, _>, QueueError>>()?;

        let output = self
            .client
            .send_message()
            .queue_url(queue.url())
            .message_body(message.body)
            .set_message_attributes(Some(attributes))
            .set_message_group_id(message.group_id)
            .set_message_deduplication_id(message.deduplication_id)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, queue.name().as_str()))?;

        output
            .message_id()
            .ok_or_else(|| missing_field("SendMessage", "MessageId"))?
            .parse::<MessageId>()
            .map_err(QueueError::from)
    }

    async fn receive_messages(
        &self,
        queue: &QueueIdentity,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue.url())
            .max_number_of_messages(clamp_i32(u64::from(options.max_messages)))
            .visibility_timeout(clamp_i32(options.visibility_timeout.as_secs()))
            .wait_time_seconds(clamp_i32(options.wait_time.as_secs()))
            .message_attribute_names("All")
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, queue.name().as_str()))?;

        Ok(collect_messages(output.messages()))
    }

    async fn delete_message(
        &self,
        queue: &QueueIdentity,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue.url())
            .receipt_handle(receipt.as_str())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, receipt.as_str()))?;
        Ok(())
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn clamp_i32(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn missing_field(operation: &str, field: &str) -> QueueError {
    QueueError::ProviderError {
        provider: PROVIDER.to_string(),
        code: "MissingField".to_string(),
        message: format!("{} response has no {}", operation, field),
    }
}

/// Fold an SDK error into the backend-neutral taxonomy.
///
/// `subject` names the queue or receipt the failed call was about.
fn map_sdk_error<E>(error: E, subject: &str) -> QueueError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let Some(code) = error.code() else {
        return QueueError::ConnectionFailed {
            message: DisplayErrorContext(&error).to_string(),
        };
    };

    let message = error
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&error).to_string());

    if QUEUE_NOT_FOUND_CODES.contains(&code) {
        QueueError::QueueNotFound {
            queue_name: subject.to_string(),
        }
    } else if INVALID_RECEIPT_CODES.contains(&code) {
        QueueError::MessageNotFound {
            receipt: subject.to_string(),
        }
    } else if AUTHENTICATION_CODES.contains(&code) {
        QueueError::AuthenticationFailed { message }
    } else {
        QueueError::ProviderError {
            provider: PROVIDER.to_string(),
            code: code.to_string(),
            message,
        }
    }
}

fn to_sqs_attribute(value: &AttributeValue) -> Result<MessageAttributeValue, QueueError> {
    let builder = MessageAttributeValue::builder().data_type(value.data_type());
    let builder = match value {
        AttributeValue::String(text) | AttributeValue::Number(text) => {
            builder.string_value(text.as_str())
        }
        AttributeValue::Binary(bytes) => builder.binary_value(Blob::new(bytes.to_vec())),
    };

    builder.build().map_err(|e| QueueError::ProviderError {
        provider: PROVIDER.to_string(),
        code: "InvalidAttribute".to_string(),
        message: e.to_string(),
    })
}

/// Convert an SQS attribute. Custom data types (`Binary.gzip`, `String.uuid`)
/// map onto their base type; attributes without a value are skipped.
fn from_sqs_attribute(value: &MessageAttributeValue) -> Option<AttributeValue> {
    let data_type = value.data_type();
    if data_type.starts_with("Binary") {
        value
            .binary_value()
            .map(|blob| AttributeValue::Binary(Bytes::copy_from_slice(blob.as_ref())))
    } else if data_type.starts_with("Number") {
        value
            .string_value()
            .map(|text| AttributeValue::Number(text.to_string()))
    } else {
        value
            .string_value()
            .map(|text| AttributeValue::String(text.to_string()))
    }
}

/// Convert a received batch, skipping messages the backend returned without
/// an id or receipt. Those stay on the queue and do not fail their siblings.
fn collect_messages(messages: &[Message]) -> Vec<ReceivedMessage> {
    messages
        .iter()
        .filter_map(|message| match from_sqs_message(message) {
            Ok(received) => Some(received),
            Err(e) => {
                warn!(
                    message_id = message.message_id().unwrap_or("<none>"),
                    error = %e,
                    "Skipping malformed message in batch"
                );
                None
            }
        })
        .collect()
}

fn from_sqs_message(message: &Message) -> Result<ReceivedMessage, QueueError> {
    let message_id: MessageId = message
        .message_id()
        .ok_or_else(|| missing_field("ReceiveMessage", "MessageId"))?
        .parse()?;
    let receipt_handle = message
        .receipt_handle()
        .map(ReceiptHandle::new)
        .ok_or_else(|| missing_field("ReceiveMessage", "ReceiptHandle"))?;

    let attributes = message
        .message_attributes()
        .map(|attributes| {
            attributes
                .iter()
                .filter_map(|(name, value)| {
                    from_sqs_attribute(value).map(|value| (name.clone(), value))
                })
                .collect()
        })
        .unwrap_or_default();

    let receive_count = message
        .attributes()
        .and_then(|system| system.get(&MessageSystemAttributeName::ApproximateReceiveCount))
        .and_then(|count| count.parse().ok())
        .unwrap_or(1);

    Ok(ReceivedMessage {
        message_id,
        receipt_handle,
        body: message.body().unwrap_or_default().to_string(),
        attributes,
        receive_count,
    })
}

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;
