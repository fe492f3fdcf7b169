//! The record written by a successful idempotency claim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::DedupKey;

/// A claimed idempotency record. Created by a conditional put; never
/// updated; expires via the store's TTL mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: DedupKey,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// Build a new record with `expires_at = created_at + ttl`.
    pub fn new(key: DedupKey, created_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            key,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// `true` if `now` is at or past `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
