use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, trace, warn};
use zipline_core::{CacheError, CacheResult, KvCache};

/// Prefix applied to every key this service stores in Redis.
pub const SERVICE_PREFIX: &str = "shorturl_";

/// A Redis-backed implementation of [`KvCache`].
///
/// Every key is namespaced with the service prefix so that the short-URL
/// keys, negative sentinels, locks, bloom filters, and guard values never
/// collide with other tenants of the same Redis instance.
#[derive(Debug, Clone)]
pub struct RedisKvCache {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_connection_refusal() || err.is_connection_dropped() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisKvCache {
    /// Creates a new Redis KV cache with the service prefix.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: SERVICE_PREFIX.to_string(),
        }
    }

    /// Creates a new Redis KV cache with a custom key prefix.
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl KvCache for RedisKvCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.full_key(key);
        trace!(key = %key, "fetching value from Redis");

        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<()> {
        let key = self.full_key(key);
        trace!(key = %key, ttl_secs, "storing value in Redis");

        let mut conn = self.conn.clone();
        let result = if ttl_secs > 0 {
            conn.set_ex::<_, _, ()>(&key, value, ttl_secs).await
        } else {
            conn.set::<_, _, ()>(&key, value).await
        };

        result.map_err(|e| {
            warn!(key = %key, error = %e, "Redis error on set");
            map_redis_error("failed to write value to Redis", e)
        })
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl_secs: u64) -> CacheResult<bool> {
        let key = self.full_key(key);
        trace!(key = %key, ttl_secs, "conditionally storing value in Redis");

        // A single SET with NX so the existence check and the write are one
        // atomic step on the server.
        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(value).arg("NX");
        if ttl_secs > 0 {
            cmd.arg("EX").arg(ttl_secs);
        }

        let mut conn = self.conn.clone();
        match cmd.query_async::<Option<String>>(&mut conn).await {
            Ok(reply) => {
                let written = reply.is_some();
                debug!(key = %key, written, "SET NX completed");
                Ok(written)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Redis error on SET NX");
                Err(map_redis_error("failed to conditionally write to Redis", e))
            }
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let key = self.full_key(key);

        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(&key).await.map_err(|e| {
            warn!(key = %key, error = %e, "Redis error on exists");
            map_redis_error("failed to check key existence in Redis", e)
        })
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let key = self.full_key(key);
        trace!(key = %key, "removing value from Redis");

        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&key).await.map_err(|e| {
            warn!(key = %key, error = %e, "Redis error on delete");
            map_redis_error("failed to delete value from Redis", e)
        })
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> CacheResult<bool> {
        let key = self.full_key(key);
        trace!(key = %key, "compare-and-delete in Redis");

        // GET and DEL must be one atomic step, otherwise a lock that expires
        // between them could delete another owner's lease.
        let script = redis::Script::new(
            r#"
            if redis.call("get", KEYS[1]) == ARGV[1] then
                return redis.call("del", KEYS[1])
            else
                return 0
            end
            "#,
        );

        let mut conn = self.conn.clone();
        match script
            .key(&key)
            .arg(expected)
            .invoke_async::<i64>(&mut conn)
            .await
        {
            Ok(deleted) => Ok(deleted > 0),
            Err(e) => {
                warn!(key = %key, error = %e, "Redis error on compare-and-delete");
                Err(map_redis_error("failed to compare-and-delete in Redis", e))
            }
        }
    }
}

// Unit coverage for the trait contract lives in memory.rs against the
// in-memory implementation; exercising this type requires a live Redis.
