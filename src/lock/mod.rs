//! Cluster-wide mutual exclusion
//!
//! A lock is a `(key, token, ttl)` triple in a shared backend. Acquisition
//! never blocks or retries; release only removes the key when the caller
//! presents the token it acquired with. The TTL is the fail-safe for a holder
//! that dies without releasing.

pub mod redis;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

pub use self::redis::{create_redis_pool, RedisLockManager};

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Lock backend errors
#[derive(Error, Debug)]
pub enum LockError {
    /// Command failed on the backend
    #[error("Lock backend error: {0}")]
    Backend(#[from] ::redis::RedisError),

    /// Could not obtain a pooled connection
    #[error("Lock backend pool error: {0}")]
    Pool(String),

    /// Request rejected before reaching the backend
    #[error("Invalid lock request: {0}")]
    Invalid(String),
}

impl LockError {
    /// Check if retrying later might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Pool(_))
    }
}

impl From<deadpool_redis::PoolError> for LockError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

/// Non-blocking, token-guarded lock
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Set `key = token` with a TTL if the key is absent.
    ///
    /// Returns false when another holder has the key.
    async fn acquire(&self, key: &str, token: &str, ttl_secs: u64) -> LockResult<bool>;

    /// Delete `key` only if it still holds `token`.
    ///
    /// Returns false when the key is absent or owned by another token.
    async fn release(&self, key: &str, token: &str) -> LockResult<bool>;
}

/// Process-local lock with monotonic-clock expiry
#[derive(Default)]
pub struct InMemoryLockManager {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current holder of `key`, if the lock has not expired
    pub fn holder(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries()
            .get(key)
            .filter(|(_, expires)| *expires > now)
            .map(|(token, _)| token.clone())
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: &str, token: &str, ttl_secs: u64) -> LockResult<bool> {
        if ttl_secs == 0 {
            return Err(LockError::Invalid("ttl must be positive".to_string()));
        }

        let now = Instant::now();
        let mut entries = self.entries();

        if let Some((_, expires)) = entries.get(key) {
            if *expires > now {
                return Ok(false);
            }
        }

        entries.insert(
            key.to_string(),
            (token.to_string(), now + Duration::from_secs(ttl_secs)),
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> LockResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries();

        match entries.get(key) {
            Some((held, expires)) if held == token && *expires > now => {
                entries.remove(key);
                Ok(true)
            }
            Some((_, expires)) if *expires <= now => {
                entries.remove(key);
                Ok(false)
            }
            _ => Ok(false),
        }
    }
}
