//! The idempotency guard: a conditional put against a key-value store,
//! with TTL, keyed by the dedup key.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use reviewer_idempotency::{ClaimOutcome, InMemoryIdempotencyStore, claim};
//! use reviewer_types::DedupKey;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let store = InMemoryIdempotencyStore::new();
//!     let key = DedupKey::new("acme/widgets", 1, &"a".repeat(40));
//!     let now = Utc::now();
//!     let ttl = chrono::Duration::days(7);
//!
//!     let first = claim(&store, &key, now, ttl).await.unwrap();
//!     let second = claim(&store, &key, now, ttl).await.unwrap();
//!     assert_eq!(first, ClaimOutcome::Claimed);
//!     assert_eq!(second, ClaimOutcome::AlreadyHandled);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use reviewer_types::{DedupKey, IdempotencyRecord};

/// Anything that can perform a conditional put against a key-value store.
/// `put_if_absent` returns `Ok(true)` on first success, `Ok(false)` when a
/// record already exists for the key (a genuine conflict, not an error).
/// Any other failure is returned as `Err` and must propagate so the
/// message gets redelivered.
#[async_trait::async_trait]
pub trait IdempotencyStore {
    async fn put_if_absent(&self, record: &IdempotencyRecord) -> Result<bool>;
}

/// The outcome of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This call is the first to claim the key; proceed with the review.
    Claimed,
    /// A previous call already claimed the key; treat this message as
    /// already handled and return success without side effects.
    AlreadyHandled,
}

/// Attempt to claim `key` for `ttl` starting at `now`.
pub async fn claim<S: IdempotencyStore + ?Sized>(
    store: &S,
    key: &DedupKey,
    now: DateTime<Utc>,
    ttl: chrono::Duration,
) -> Result<ClaimOutcome> {
    let record = IdempotencyRecord::new(key.clone(), now, ttl);
    if store.put_if_absent(&record).await? {
        Ok(ClaimOutcome::Claimed)
    } else {
        Ok(ClaimOutcome::AlreadyHandled)
    }
}

/// An in-memory store, for tests and for local/dry-run invocations that
/// have no real key-value store configured.
#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    records: Mutex<HashMap<String, IdempotencyRecord>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn put_if_absent(&self, record: &IdempotencyRecord) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(record.key.as_str()) {
            return Ok(false);
        }
        records.insert(record.key.as_str().to_string(), record.clone());
        Ok(true)
    }
}
