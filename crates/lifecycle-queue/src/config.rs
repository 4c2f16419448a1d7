//! Consumer and publisher configuration.

use crate::error::ConfigurationError;
use crate::message::{QueueLocator, QueueName, ReceiveOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest receive batch the backend accepts
pub const MAX_BATCH_SIZE: u32 = 10;

/// Longest long-poll wait the backend accepts
pub const MAX_WAIT_TIME_SECS: u64 = 20;

/// Longest visibility timeout the backend accepts (12 hours)
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 12 * 60 * 60;

/// Configuration for a [`Consumer`](crate::consumer::Consumer)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    pub queue_name: QueueName,

    /// Account owning the queue when it lives in another account
    pub owner_account: Option<String>,

    /// Number of decode/dispatch workers
    pub worker_count: usize,

    /// Messages requested per receive call
    pub batch_size: u32,

    pub visibility_timeout_secs: u64,

    /// Long-poll wait per receive call
    pub wait_time_secs: u64,

    /// Pause after a receive call that returned nothing
    pub empty_poll_delay_ms: u64,

    /// Capacity of the buffer between the poll loop and the decode stage
    pub raw_buffer_capacity: usize,

    /// Capacity of the buffer between the decode and dispatch stages
    pub decoded_buffer_capacity: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            owner_account: None,
            worker_count: 25,
            batch_size: MAX_BATCH_SIZE,
            visibility_timeout_secs: 30,
            wait_time_secs: MAX_WAIT_TIME_SECS,
            empty_poll_delay_ms: 1000,
            raw_buffer_capacity: 100,
            decoded_buffer_capacity: 100,
        }
    }
}

impl ConsumerConfig {
    pub fn new(queue_name: QueueName) -> Self {
        Self {
            queue_name,
            ..Self::default()
        }
    }

    pub fn with_owner_account(mut self, account: impl Into<String>) -> Self {
        self.owner_account = Some(account.into());
        self
    }

    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_visibility_timeout_secs(mut self, secs: u64) -> Self {
        self.visibility_timeout_secs = secs;
        self
    }

    pub fn with_wait_time_secs(mut self, secs: u64) -> Self {
        self.wait_time_secs = secs;
        self
    }

    pub fn with_empty_poll_delay_ms(mut self, millis: u64) -> Self {
        self.empty_poll_delay_ms = millis;
        self
    }

    /// Set both pipeline buffer capacities
    pub fn with_buffer_capacity(mut self, raw: usize, decoded: usize) -> Self {
        self.raw_buffer_capacity = raw;
        self.decoded_buffer_capacity = decoded;
        self
    }

    pub fn locator(&self) -> QueueLocator {
        QueueLocator {
            name: self.queue_name.clone(),
            owner_account: self.owner_account.clone(),
        }
    }

    pub fn receive_options(&self) -> ReceiveOptions {
        ReceiveOptions {
            max_messages: self.batch_size,
            visibility_timeout: Duration::from_secs(self.visibility_timeout_secs),
            wait_time: Duration::from_secs(self.wait_time_secs),
        }
    }

    pub fn empty_poll_delay(&self) -> Duration {
        Duration::from_millis(self.empty_poll_delay_ms)
    }

    /// Reject settings the backend or the pipeline cannot honour
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.worker_count == 0 {
            return Err(invalid("worker_count must be at least 1"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(invalid(format!(
                "batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        if self.visibility_timeout_secs > MAX_VISIBILITY_TIMEOUT_SECS {
            return Err(invalid(format!(
                "visibility_timeout_secs must not exceed {}",
                MAX_VISIBILITY_TIMEOUT_SECS
            )));
        }
        if self.wait_time_secs > MAX_WAIT_TIME_SECS {
            return Err(invalid(format!(
                "wait_time_secs must not exceed {}",
                MAX_WAIT_TIME_SECS
            )));
        }
        if self.raw_buffer_capacity == 0 || self.decoded_buffer_capacity == 0 {
            return Err(invalid("buffer capacities must be at least 1"));
        }
        if matches!(&self.owner_account, Some(account) if account.is_empty()) {
            return Err(invalid("owner_account must not be empty when set"));
        }
        Ok(())
    }
}

/// Configuration for a [`Publisher`](crate::publisher::Publisher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub queue_name: QueueName,

    /// Account owning the queue when it lives in another account
    pub owner_account: Option<String>,

    /// Message group used when a message has no business key
    pub message_group_id: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            owner_account: None,
            message_group_id: "default".to_string(),
        }
    }
}

impl PublisherConfig {
    pub fn new(queue_name: QueueName) -> Self {
        Self {
            queue_name,
            ..Self::default()
        }
    }

    pub fn with_owner_account(mut self, account: impl Into<String>) -> Self {
        self.owner_account = Some(account.into());
        self
    }

    pub fn with_message_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.message_group_id = group_id.into();
        self
    }

    pub fn locator(&self) -> QueueLocator {
        QueueLocator {
            name: self.queue_name.clone(),
            owner_account: self.owner_account.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.message_group_id.is_empty() || self.message_group_id.len() > 128 {
            return Err(invalid("message_group_id must be 1-128 characters"));
        }
        if matches!(&self.owner_account, Some(account) if account.is_empty()) {
            return Err(invalid("owner_account must not be empty when set"));
        }
        Ok(())
    }
}

fn default_queue_name() -> QueueName {
    QueueName("lifecycle-events".to_string())
}

fn invalid(message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::Invalid {
        message: message.into(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
