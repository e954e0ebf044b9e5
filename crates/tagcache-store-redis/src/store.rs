//! Redis-backed store implementation.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::{AsyncCommands, RedisError};
use serde::{Deserialize, Serialize};
use tagcache_store::{BackingStore, StoreError};

/// How many keys `SCAN` is asked for per round trip.
const SCAN_BATCH: u64 = 500;

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Connection pool size
    pub pool_size: usize,
    /// Wait/create/recycle timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            timeout_ms: 5000,
        }
    }
}

/// Backing store over a pooled Redis connection.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("pool_status", &self.pool.status())
            .finish()
    }
}

impl RedisStore {
    /// Wraps an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds a pool from `config` and verifies that a connection can be made.
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self, StoreError> {
        tracing::info!(url = %config.url, "Connecting to Redis");

        let timeout = Duration::from_millis(config.timeout_ms);
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| StoreError::connection(format!("failed to create Redis pool: {e}")))?;

        let store = Self::new(pool);
        store.ping().await?;
        tracing::info!("Connected to Redis");
        Ok(store)
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn conn(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::connection(format!("failed to get Redis connection: {e}")))
    }
}

/// Maps a Redis error onto the store taxonomy.
fn map_err(command: &str, key: &str, expected: &'static str, err: RedisError) -> StoreError {
    if err.code() == Some("WRONGTYPE") {
        return StoreError::wrong_type(key, expected);
    }
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        return StoreError::connection(err.to_string());
    }
    StoreError::command(command, err.to_string())
}

#[async_trait]
impl BackingStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| map_err("GET", key, "string", e))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| map_err("SET", key, "string", e))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        conn.del::<_, u64>(keys.to_vec())
            .await
            .map_err(|e| map_err("DEL", &keys[0], "any", e))
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_err("SCAN", pattern, "any", e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let applied: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_err("EXPIRE", key, "any", e))?;
        Ok(applied == 1)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn().await?;
        let ttl: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_err("TTL", key, "any", e))?;
        // -2: key missing, -1: no expiry
        Ok(if ttl == -2 { None } else { Some(ttl) })
    }

    async fn set_add(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.sadd::<_, _, ()>(set_key, member)
            .await
            .map_err(|e| map_err("SADD", set_key, "set", e))
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.srem::<_, _, ()>(set_key, member)
            .await
            .map_err(|e| map_err("SREM", set_key, "set", e))
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        conn.smembers::<_, Vec<String>>(set_key)
            .await
            .map_err(|e| map_err("SMEMBERS", set_key, "set", e))
    }

    async fn list_push_front(&self, list_key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.lpush::<_, _, ()>(list_key, value)
            .await
            .map_err(|e| map_err("LPUSH", list_key, "list", e))
    }

    async fn list_trim(&self, list_key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.ltrim::<_, ()>(list_key, start as isize, stop as isize)
            .await
            .map_err(|e| map_err("LTRIM", list_key, "list", e))
    }

    async fn list_range(
        &self,
        list_key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        conn.lrange::<_, Vec<String>>(list_key, start as isize, stop as isize)
            .await
            .map_err(|e| map_err("LRANGE", list_key, "list", e))
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        conn.incr::<_, _, i64>(key, by)
            .await
            .map_err(|e| map_err("INCRBY", key, "counter", e))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_err("PING", "", "any", e))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.timeout_ms, 5000);
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_redis_fails() {
        let config = RedisStoreConfig {
            // Port 1 is reserved and never runs Redis.
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
            timeout_ms: 200,
        };
        let err = RedisStore::connect(&config).await.unwrap_err();
        assert!(err.is_connection());
    }
}
