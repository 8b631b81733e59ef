//! One-shot result forwarding
//!
//! A message id enters the ledger once; afterwards every further win/loss
//! reaction on that message is skipped.

use crate::types::MessageId;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct ResolutionLedger {
    resolved: Mutex<HashMap<MessageId, DateTime<Utc>>>,
}

impl ResolutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per id; the caller forwards only on true
    pub fn mark_if_unresolved(&self, id: MessageId) -> bool {
        let mut resolved = self.resolved.lock();
        if resolved.contains_key(&id) {
            return false;
        }
        resolved.insert(id, Utc::now());
        true
    }

    pub fn is_resolved(&self, id: MessageId) -> bool {
        self.resolved.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.resolved.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut resolved = self.resolved.lock();
        let before = resolved.len();
        resolved.retain(|_, at| *at > cutoff);
        before - resolved.len()
    }
}
