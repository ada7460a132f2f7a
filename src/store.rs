//! Shared decision store: blocklist, windowed counters, and keyed values with TTL.
//!
//! The store is the coordination substrate of the whole pipeline. Modules write
//! counters and markers into it, the engine consults its blocklist before running any
//! module, and because the distributed variant shares one backend across a fleet, a
//! block decided on one instance denies on all of them. Three conceptually independent
//! mappings live behind one trait:
//!
//! 1. *Blocks*: key → (reason, expiry); lookups evict expired entries as a side effect.
//! 2. *Counters*: key → (count, expiry) with increment-or-create semantics.
//! 3. *KV*: key → (value, expiry) with plain put/get.
//!
//! Per-key block/unblock/lookup is linearizable and counter increments are atomic in
//! both variants. A live counter's window is never rewritten by later increments; only
//! re-initialization after expiry sets a new window.
//!
//! Store faults propagate out of the trait as [`StoreError`]. Request-path callers must
//! degrade to "no data" (not blocked, count 0) and keep serving; async callers log and
//! discard.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

mod memory;
#[cfg(feature = "distributed")]
#[cfg_attr(docsrs, doc(cfg(feature = "distributed")))]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "distributed")]
pub use redis::RedisStore;

/// Failure talking to the store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Blocklist + counters + TTL KV shared across request threads, the batch worker, and
/// (in the distributed variant) every instance in the fleet.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use sentinai::store::{DecisionStore, MemoryStore};
///
/// # async fn example() {
/// let store = MemoryStore::new();
///
/// store
///     .block("203.0.113.9", "credential stuffing", Some(Duration::from_secs(1800)))
///     .await
///     .unwrap();
/// assert!(store.is_blocked("203.0.113.9").await.unwrap());
///
/// let count = store
///     .increment_counter("cg:global:failures", Duration::from_secs(300))
///     .await
///     .unwrap();
/// assert_eq!(count, 1);
/// # }
/// ```
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// True iff a non-expired block exists for `key`. Expired entries are removed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::store::DecisionStore;
    /// # async fn example(store: &dyn DecisionStore) {
    /// if store.is_blocked("user:mallory").await.unwrap_or(false) {
    ///     // deny the request
    /// }
    /// # }
    /// ```
    async fn is_blocked(&self, key: &str) -> Result<bool, StoreError>;

    /// Upserts a block; `duration = None` means permanent.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use std::time::Duration;
    /// # use sentinai::store::DecisionStore;
    /// # async fn example(store: &dyn DecisionStore) {
    /// // 30-minute block
    /// store.block("admin", "12 failed logins", Some(Duration::from_secs(1800))).await.unwrap();
    /// // permanent block
    /// store.block("203.0.113.9", "known bad actor", None).await.unwrap();
    /// # }
    /// ```
    async fn block(&self, key: &str, reason: &str, duration: Option<Duration>)
    -> Result<(), StoreError>;

    /// Removes a block immediately.
    async fn unblock(&self, key: &str) -> Result<(), StoreError>;

    /// Atomic increment-or-create. Absent or expired keys restart at `(1, now + window)`;
    /// live keys increment without touching their expiry. Returns the post-increment
    /// count.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use std::time::Duration;
    /// # use sentinai::store::DecisionStore;
    /// # async fn example(store: &dyn DecisionStore) {
    /// let count = store
    ///     .increment_counter("cp:user:alice", Duration::from_secs(86_400))
    ///     .await
    ///     .unwrap();
    /// if count > 100 {
    ///     // over quota
    /// }
    /// # }
    /// ```
    async fn increment_counter(&self, key: &str, window: Duration) -> Result<u64, StoreError>;

    /// Current count without incrementing; 0 when absent or expired.
    async fn get_counter(&self, key: &str) -> Result<u64, StoreError>;

    /// Stores `value` under `key`; `ttl = None` means no expiry.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use std::time::Duration;
    /// # use sentinai::store::DecisionStore;
    /// # async fn example(store: &dyn DecisionStore) {
    /// store.put("bola:seq:alice:last", "104", Some(Duration::from_secs(600))).await.unwrap();
    /// assert_eq!(store.get("bola:seq:alice:last").await.unwrap().as_deref(), Some("104"));
    /// # }
    /// ```
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Fetches a value; `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Snapshot of all non-expired blocks as key → reason.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use sentinai::store::DecisionStore;
    /// # async fn example(store: &dyn DecisionStore) {
    /// for (key, reason) in store.all_blocked().await.unwrap() {
    ///     println!("{key}: {reason}");
    /// }
    /// # }
    /// ```
    async fn all_blocked(&self) -> Result<HashMap<String, String>, StoreError>;
}
