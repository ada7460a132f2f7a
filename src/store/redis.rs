//! Fleet-shared decision store over Redis.
//!
//! Every operation maps onto Redis primitives that already carry the contract:
//! `SET .. EX` for blocks and KV, `INCR` plus a first-increment `EXPIRE` for windowed
//! counters, `SCAN` for the blocklist snapshot. `INCR` only touches the TTL on the
//! increment that created the key, so a live counter's window is never rewritten.
//! Physical keys carry a `sentinai:` namespace; the logical key layout used by the
//! modules is preserved beneath it, so in-memory and distributed deployments stay
//! interchangeable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

use super::{DecisionStore, StoreError};

const BLOCK_NS: &str = "sentinai:block:";
const COUNTER_NS: &str = "sentinai:counter:";
const KV_NS: &str = "sentinai:kv:";

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Decision store shared across a fleet through a Redis backend.
///
/// # Examples
///
/// ```rust,no_run
/// use sentinai::store::{DecisionStore, RedisStore};
///
/// # async fn example() -> Result<(), sentinai::store::StoreError> {
/// let store = RedisStore::connect("redis://10.0.0.5/").await?;
/// // a block written here is visible to every instance sharing the backend
/// store.block("203.0.113.9", "fleet-wide ban", None).await?;
/// # Ok(())
/// # }
/// ```
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to `url` (e.g. `redis://10.0.0.5/`) with automatic reconnection.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn ttl_secs(duration: Duration) -> u64 {
        duration.as_secs().max(1)
    }
}

#[async_trait]
impl DecisionStore for RedisStore {
    async fn is_blocked(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(format!("{BLOCK_NS}{key}")).await?;
        Ok(exists)
    }

    async fn block(
        &self,
        key: &str,
        reason: &str,
        duration: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = format!("{BLOCK_NS}{key}");
        match duration {
            Some(d) => conn.set_ex::<_, _, ()>(key, reason, Self::ttl_secs(d)).await?,
            None => conn.set::<_, _, ()>(key, reason).await?,
        }
        Ok(())
    }

    async fn unblock(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("{BLOCK_NS}{key}")).await?;
        Ok(())
    }

    async fn increment_counter(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let key = format!("{COUNTER_NS}{key}");
        let count: u64 = conn.incr(&key, 1u64).await?;
        if count == 1 {
            conn.expire::<_, ()>(&key, Self::ttl_secs(window) as i64).await?;
        }
        Ok(count)
    }

    async fn get_counter(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(format!("{COUNTER_NS}{key}")).await?;
        Ok(count.unwrap_or(0))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = format!("{KV_NS}{key}");
        match ttl {
            Some(d) => conn.set_ex::<_, _, ()>(key, value, Self::ttl_secs(d)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(format!("{KV_NS}{key}")).await?;
        Ok(value)
    }

    async fn all_blocked(&self) -> Result<HashMap<String, String>, StoreError> {
        let mut scan_conn = self.conn.clone();
        let mut keys = Vec::new();
        {
            let mut iter = scan_conn
                .scan_match::<_, String>(format!("{BLOCK_NS}*"))
                .await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut conn = self.conn.clone();
        let mut blocked = HashMap::new();
        for key in keys {
            if let Some(reason) = conn.get::<_, Option<String>>(&key).await? {
                let logical = key.trim_start_matches(BLOCK_NS).to_string();
                blocked.insert(logical, reason);
            }
        }
        Ok(blocked)
    }
}
