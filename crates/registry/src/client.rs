//! Redis-backed implementation of the group registry: membership,
//! partition locks, and persisted offsets.

use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time::timeout;

const DEFAULT_TIMEOUT_MS: u64 = 2000;

fn timeout_ms() -> u64 {
    std::env::var("REGISTRY_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_MS)
}

fn members_key() -> String {
    "cohort:members".to_string()
}

fn lock_key(key: &str) -> String {
    format!("cohort:lock:{key}")
}

fn offset_key(key: &str) -> String {
    format!("cohort:offset:{key}")
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Distributed coordination primitives the rebalancer and persister need:
/// group membership (who else is consuming), per-partition locks, and a
/// durable offset store.
#[async_trait]
pub trait GroupRegistry: Send + Sync {
    /// Record this member as alive. Idempotent; call on every heartbeat tick.
    async fn heartbeat(&self, member_id: &str, ttl: Duration) -> Result<()>;

    /// Members seen within `ttl` of now.
    async fn members(&self, ttl: Duration) -> Result<Vec<String>>;

    /// Attempt to acquire the partition lock. Returns `false` if already held.
    async fn acquire_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool>;

    /// Release the lock, only if still held by `owner`.
    async fn release_lock(&self, key: &str, owner: &str) -> Result<()>;

    /// Last persisted offset for a partition, if any.
    async fn get_offset(&self, key: &str) -> Result<Option<i64>>;

    /// Persist the offset for a partition.
    async fn set_offset(&self, key: &str, offset: i64) -> Result<()>;

    /// Persist several offsets in one round trip. Used by the persister to
    /// flush its whole accumulator as a single write.
    async fn set_offsets(&self, pairs: &[(String, i64)]) -> Result<()>;
}

pub struct RedisGroupRegistry {
    connection: MultiplexedConnection,
}

impl RedisGroupRegistry {
    pub async fn connect(addr: &str) -> Result<Self> {
        let client = redis::Client::open(addr)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl GroupRegistry for RedisGroupRegistry {
    async fn heartbeat(&self, member_id: &str, _ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let fut = conn.zadd::<_, _, _, ()>(members_key(), member_id, now_ms());
        timeout(Duration::from_millis(timeout_ms()), fut).await??;
        Ok(())
    }

    async fn members(&self, ttl: Duration) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let cutoff = now_ms() - ttl.as_millis() as i64;
        let fut = conn.zrangebyscore::<_, _, _, Vec<String>>(members_key(), cutoff, "+inf");
        let members = timeout(Duration::from_millis(timeout_ms()), fut).await??;
        Ok(members)
    }

    async fn acquire_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        let redis_key = lock_key(key);

        // A member re-acquiring a lock it already holds must succeed and
        // refresh the TTL, not block on NX against its own key.
        let current: Option<String> =
            timeout(Duration::from_millis(timeout_ms()), conn.get(&redis_key)).await??;

        if current.as_deref() == Some(owner) {
            let fut = conn.set_ex::<_, _, ()>(&redis_key, owner, seconds);
            timeout(Duration::from_millis(timeout_ms()), fut).await??;
            return Ok(true);
        }

        let fut = redis::cmd("SET")
            .arg(&redis_key)
            .arg(owner)
            .arg("EX")
            .arg(seconds)
            .arg("NX")
            .query_async::<_, Option<String>>(&mut conn);

        let result = timeout(Duration::from_millis(timeout_ms()), fut).await??;
        Ok(result.is_some())
    }

    async fn release_lock(&self, key: &str, owner: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let current: Option<String> = timeout(
            Duration::from_millis(timeout_ms()),
            conn.get(lock_key(key)),
        )
        .await??;

        if current.as_deref() == Some(owner) {
            let fut = conn.del::<_, ()>(lock_key(key));
            timeout(Duration::from_millis(timeout_ms()), fut).await??;
        }
        Ok(())
    }

    async fn get_offset(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.connection.clone();
        let fut = conn.get::<_, Option<i64>>(offset_key(key));
        let value = timeout(Duration::from_millis(timeout_ms()), fut).await??;
        Ok(value)
    }

    async fn set_offset(&self, key: &str, offset: i64) -> Result<()> {
        let mut conn = self.connection.clone();
        let fut = conn.set::<_, _, ()>(offset_key(key), offset);
        timeout(Duration::from_millis(timeout_ms()), fut).await??;
        Ok(())
    }

    async fn set_offsets(&self, pairs: &[(String, i64)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();
        for (key, offset) in pairs {
            pipe.set(offset_key(key), offset).ignore();
        }

        let fut = pipe.query_async::<_, ()>(&mut conn);
        timeout(Duration::from_millis(timeout_ms()), fut).await??;
        Ok(())
    }
}
