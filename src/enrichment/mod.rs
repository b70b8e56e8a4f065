//! Enrichment handoff
//!
//! After a campaign run produces new leads, the crawler hands the campaign id
//! to the enrichment stage through a queue and moves on. The crawler never
//! waits for enrichment and the handoff never changes campaign status.
//!
//! - [`RedisEnrichmentQueue`] pushes JSON requests onto a Redis list
//!   (consumers pop from the other end, at-least-once)
//! - [`ChannelEnrichmentQueue`] delivers to an in-process receiver

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::Pool;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Result type for enrichment handoff
pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

/// Enrichment handoff errors
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Failed to serialize enrichment request: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Enrichment queue backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("Enrichment queue pool error: {0}")]
    Pool(String),

    #[error("Enrichment queue receiver closed")]
    Closed,

    #[error("Enrichment queue is full")]
    Full,
}

impl EnrichmentError {
    /// Check if retrying later might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Pool(_) | Self::Full)
    }
}

impl From<deadpool_redis::PoolError> for EnrichmentError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

/// Request for the enrichment stage to process a campaign's new leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub campaign_id: Uuid,
    pub max_batch_size: u32,
    pub requested_at: DateTime<Utc>,
}

impl EnrichmentRequest {
    pub fn new(campaign_id: Uuid, max_batch_size: u32) -> Self {
        Self {
            campaign_id,
            max_batch_size,
            requested_at: Utc::now(),
        }
    }
}

/// Fire-and-forget handoff to the enrichment stage
#[async_trait]
pub trait EnrichmentQueue: Send + Sync {
    async fn enqueue(&self, request: &EnrichmentRequest) -> EnrichmentResult<()>;
}

/// Durable queue on a Redis list
pub struct RedisEnrichmentQueue {
    pool: Pool,
    queue_key: String,
}

impl RedisEnrichmentQueue {
    /// `queue_key` is namespaced by `key_prefix` when the prefix is non-empty
    pub fn new(pool: Pool, key_prefix: &str, queue_key: &str) -> Self {
        let queue_key = if key_prefix.is_empty() {
            queue_key.to_string()
        } else {
            format!("{key_prefix}:{queue_key}")
        };
        Self { pool, queue_key }
    }

    /// Fully qualified list key
    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }
}

#[async_trait]
impl EnrichmentQueue for RedisEnrichmentQueue {
    async fn enqueue(&self, request: &EnrichmentRequest) -> EnrichmentResult<()> {
        let payload = serde_json::to_string(request)?;
        let mut conn = self.pool.get().await?;

        let depth: i64 = redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(payload)
            .query_async(&mut *conn)
            .await?;

        tracing::debug!(
            campaign_id = %request.campaign_id,
            queue = %self.queue_key,
            depth,
            "Enrichment request enqueued"
        );
        Ok(())
    }
}

/// In-process queue backed by a tokio channel
#[derive(Clone)]
pub struct ChannelEnrichmentQueue {
    tx: mpsc::Sender<EnrichmentRequest>,
}

impl ChannelEnrichmentQueue {
    /// Create a queue and the receiver that consumes it
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EnrichmentRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EnrichmentQueue for ChannelEnrichmentQueue {
    async fn enqueue(&self, request: &EnrichmentRequest) -> EnrichmentResult<()> {
        // Never wait for the consumer; a full queue is reported and dropped
        self.tx.try_send(request.clone()).map_err(|e| match e {
            TrySendError::Full(_) => EnrichmentError::Full,
            TrySendError::Closed(_) => EnrichmentError::Closed,
        })
    }
}
