//! In-process decision store backed by concurrent maps.
//!
//! Suitable for a single instance: per-key atomicity comes from `DashMap`'s entry-level
//! locking, and expiry is tracked with monotonic `Instant`s. Expired entries are
//! evicted lazily on access; hosts that run hot for long periods can additionally call
//! [`MemoryStore::sweep_expired`] from a periodic task to keep the maps tight.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{DecisionStore, StoreError};

struct BlockEntry {
    reason: String,
    /// `None` = permanent.
    expires_at: Option<Instant>,
}

impl BlockEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Concurrent-map decision store for a single process.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use sentinai::store::{DecisionStore, MemoryStore};
///
/// # async fn example() {
/// let store = MemoryStore::new();
/// store.put("session", "alice", Some(Duration::from_secs(60))).await.unwrap();
/// assert_eq!(store.get("session").await.unwrap().as_deref(), Some("alice"));
/// # }
/// ```
#[derive(Default)]
pub struct MemoryStore {
    blocks: DashMap<String, BlockEntry>,
    counters: DashMap<String, CounterEntry>,
    kv: DashMap<String, KvEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry across all three maps.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::{sync::Arc, time::Duration};
    /// use sentinai::store::MemoryStore;
    ///
    /// # async fn example() {
    /// let store = Arc::new(MemoryStore::new());
    /// let janitor = store.clone();
    /// tokio::spawn(async move {
    ///     let mut tick = tokio::time::interval(Duration::from_secs(60));
    ///     loop {
    ///         tick.tick().await;
    ///         janitor.sweep_expired();
    ///     }
    /// });
    /// # }
    /// ```
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.blocks.retain(|_, e| !e.expired(now));
        self.counters.retain(|_, e| e.expires_at > now);
        self.kv.retain(|_, e| !e.expired(now));
    }
}

#[async_trait]
impl DecisionStore for MemoryStore {
    async fn is_blocked(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let live = match self.blocks.get(key) {
            Some(entry) => !entry.expired(now),
            None => return Ok(false),
        };
        if !live {
            self.blocks.remove_if(key, |_, e| e.expired(now));
        }
        Ok(live)
    }

    async fn block(
        &self,
        key: &str,
        reason: &str,
        duration: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.blocks.insert(
            key.to_string(),
            BlockEntry {
                reason: reason.to_string(),
                expires_at: duration.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn unblock(&self, key: &str) -> Result<(), StoreError> {
        self.blocks.remove(key);
        Ok(())
    }

    async fn increment_counter(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                expires_at: now + window,
            });
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + window;
        }
        entry.count += 1;
        Ok(entry.count)
    }

    async fn get_counter(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        let count = match self.counters.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(entry.count),
            Some(_) => 0,
            None => return Ok(0),
        };
        self.counters.remove_if(key, |_, e| e.expires_at <= now);
        Ok(count)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.kv.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let value = match self.kv.get(key) {
            Some(entry) if !entry.expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        self.kv.remove_if(key, |_, e| e.expired(now));
        Ok(value)
    }

    async fn all_blocked(&self) -> Result<HashMap<String, String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .blocks
            .iter()
            .filter(|entry| !entry.expired(now))
            .map(|entry| (entry.key().clone(), entry.reason.clone()))
            .collect())
    }
}
