//! In-flight acknowledgement tracking.

use crate::message::{MessageId, ReceiptHandle};
use dashmap::DashMap;

/// Maps the id of every decoded, not yet settled message to the receipt of its
/// latest delivery.
///
/// One table per consumer instance. Entries are sharded, so decode and dispatch
/// workers touching different messages never contend on a single lock.
///
/// A message redelivered while an earlier delivery is still being handled has
/// two deliveries in flight under one id. Each delivery settles only its own
/// record: [`settle`](Self::settle) matches on the receipt as well as the id.
#[derive(Debug, Default)]
pub struct AckTable {
    entries: DashMap<MessageId, ReceiptHandle>,
}

impl AckTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a decoded delivery, replacing the record of any older delivery
    pub fn insert(&self, id: MessageId, receipt: ReceiptHandle) {
        self.entries.insert(id, receipt);
    }

    /// Stop tracking a delivery.
    ///
    /// Returns `false` when the record is gone or belongs to a newer delivery
    /// of the same message, which is then left tracked.
    pub fn settle(&self, id: &MessageId, receipt: &ReceiptHandle) -> bool {
        self.entries
            .remove_if(id, |_, tracked| tracked == receipt)
            .is_some()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
