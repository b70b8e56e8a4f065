//! Redis lock backend
//!
//! Acquire is `SET key token NX EX ttl`. Release runs a Lua script so the
//! token comparison and the delete happen as one server-side step.

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::Script;

use super::{LockError, LockManager, LockResult};
use crate::config::RedisConfig;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Build a Redis pool and verify connectivity with `PING`
pub async fn create_redis_pool(config: &RedisConfig) -> LockResult<Pool> {
    let pool = PoolConfig::from_url(&config.url)
        .builder()
        .map_err(|e| LockError::Pool(format!("Failed to create pool builder: {e}")))?
        .max_size(config.pool_size)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| LockError::Pool(format!("Failed to create Redis pool: {e}")))?;

    let mut conn = pool.get().await?;
    let _: String = redis::cmd("PING").query_async(&mut *conn).await?;

    tracing::info!(url = %config.url, "Connected to Redis");
    Ok(pool)
}

/// [`LockManager`] over a shared Redis instance
pub struct RedisLockManager {
    pool: Pool,
    key_prefix: String,
    release_script: Script,
}

impl RedisLockManager {
    pub fn new(pool: Pool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn acquire(&self, key: &str, token: &str, ttl_secs: u64) -> LockResult<bool> {
        if ttl_secs == 0 {
            return Err(LockError::Invalid("ttl must be positive".to_string()));
        }

        let key = self.namespaced(key);
        let mut conn = self.pool.get().await?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(token)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut *conn)
            .await?;

        let acquired = reply.is_some();
        tracing::debug!(key = %key, acquired, "Lock acquire");
        Ok(acquired)
    }

    async fn release(&self, key: &str, token: &str) -> LockResult<bool> {
        let key = self.namespaced(key);
        let mut conn = self.pool.get().await?;

        let deleted: i64 = self
            .release_script
            .key(&key)
            .arg(token)
            .invoke_async(&mut *conn)
            .await?;

        if deleted == 0 {
            tracing::warn!(key = %key, "Lock was not held by this token on release");
        }
        Ok(deleted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(prefix: &str) -> RedisLockManager {
        // Building a pool does not connect
        let pool = PoolConfig::from_url("redis://localhost:6379")
            .create_pool(Some(Runtime::Tokio1))
            .unwrap();
        RedisLockManager::new(pool, prefix)
    }

    #[test]
    fn test_key_namespacing() {
        assert_eq!(
            manager("prospector").namespaced("scheduler:run"),
            "prospector:scheduler:run"
        );
        assert_eq!(manager("").namespaced("scheduler:run"), "scheduler:run");
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at localhost:6379"]
    async fn test_redis_lock_roundtrip() {
        let config = RedisConfig {
            key_prefix: format!("prospector-test-{}", uuid::Uuid::new_v4()),
            ..RedisConfig::default()
        };
        let pool = create_redis_pool(&config).await.unwrap();
        let locks = RedisLockManager::new(pool, config.key_prefix);

        assert!(locks.acquire("run", "a", 30).await.unwrap());
        assert!(!locks.acquire("run", "b", 30).await.unwrap());
        assert!(!locks.release("run", "b").await.unwrap());
        assert!(locks.release("run", "a").await.unwrap());
        assert!(locks.acquire("run", "b", 30).await.unwrap());
        assert!(locks.release("run", "b").await.unwrap());
    }
}
