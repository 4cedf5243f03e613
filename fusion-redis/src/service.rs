//! Redis service used by the job store and the notification channel.

use redis::AsyncCommands;
use std::collections::HashMap;

use crate::{
    pool::{RedisConnection, RedisPool, RedisPoolBuilder},
    pubsub::PubSub,
    RedisConfig, RedisError, Result,
};

/// Sets a field only when the hash already exists. Returns 1 when written.
const HSET_IF_EXISTS: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
    return 1
end
return 0
"#;

/// Redis service providing the connection pool and the hash and pub/sub
/// operations the dispatcher relies on.
///
/// Cheap to share behind an `Arc`; every call checks a connection out of
/// the pool for the duration of one command or transaction.
pub struct RedisService {
    config: RedisConfig,
    pool: RedisPool,
}

impl RedisService {
    /// Create a new Redis service.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = RedisPoolBuilder::new(config.clone()).build().await?;
        Ok(Self { config, pool })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get a connection from the pool.
    pub async fn get(&self) -> Result<RedisConnection<'_>> {
        let conn = self.pool.get().await?;
        Ok(RedisConnection::new(conn))
    }

    /// Create a Pub/Sub client.
    pub fn pubsub(&self) -> Result<PubSub> {
        PubSub::new(&self.config)
    }

    /// Check if the connection is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Get pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Replace the whole hash at `key` with `fields` in one transaction.
    ///
    /// Fields present before the call but absent from `fields` are gone
    /// afterwards. An empty `fields` slice deletes the hash.
    pub async fn replace_hash(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut conn = self.get().await?;
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !fields.is_empty() {
            pipe.hset_multiple(key, fields).ignore();
        }
        let _: () = pipe.query_async(&mut *conn).await?;
        Ok(())
    }

    /// Set one field, but only if the hash at `key` exists.
    ///
    /// Returns whether the field was written.
    pub async fn hset_if_exists(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut conn = self.get().await?;
        let written: i64 = redis::Script::new(HSET_IF_EXISTS)
            .key(key)
            .arg(field)
            .arg(value)
            .invoke_async(&mut *conn)
            .await?;
        Ok(written == 1)
    }

    /// Read every field of the hash at `key`. Missing keys read as empty.
    pub async fn hgetall_map(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.get().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    /// Delete the hash at `key`, returning how many fields it held.
    pub async fn delete_hash(&self, key: &str) -> Result<u64> {
        let mut conn = self.get().await?;
        let (fields, _deleted): (u64, u64) = redis::pipe()
            .atomic()
            .hlen(key)
            .del(key)
            .query_async(&mut *conn)
            .await?;
        Ok(fields)
    }

    /// Publish a message, returning how many subscribers received it.
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<u64> {
        let mut conn = self.get().await?;
        let receivers: u64 = conn.publish(channel, payload).await?;
        tracing::debug!(channel = %channel, receivers, "Published message");
        Ok(receivers)
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total connections.
    pub connections: u32,
    /// Idle connections.
    pub idle_connections: u32,
}
