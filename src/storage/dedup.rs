//! Global deduplication set on PostgreSQL
//!
//! Every external identifier any campaign has recorded lives in
//! `dedup_records`. Lookups go through a small in-process cache of positive
//! hits; a miss always falls through to the database because another
//! worker may have inserted the identifier since.

use std::collections::HashSet;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DedupStore, StorageResult};
use crate::models::DedupRecord;

/// Default number of identifiers kept in the positive cache
pub const DEFAULT_CACHE_SIZE: usize = 10_000;

/// Positive-hit cache of known identifiers
struct DedupCache {
    ids: HashSet<String>,
    max_size: usize,
}

impl DedupCache {
    fn new(max_size: usize) -> Self {
        Self {
            ids: HashSet::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    fn insert(&mut self, id: String) {
        if self.max_size == 0 {
            return;
        }
        if self.ids.len() >= self.max_size {
            // Evict half; entries are only hints so losing them is harmless
            let to_remove: Vec<_> = self.ids.iter().take(self.max_size / 2 + 1).cloned().collect();
            for item in to_remove {
                self.ids.remove(&item);
            }
        }
        self.ids.insert(id);
    }

    fn remove(&mut self, id: &str) {
        self.ids.remove(id);
    }
}

/// PostgreSQL-backed [`DedupStore`]
pub struct PgDedupStore {
    pool: Pool,
    cache: RwLock<DedupCache>,
}

impl PgDedupStore {
    pub fn new(pool: Pool) -> Self {
        Self::with_cache_size(pool, DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(pool: Pool, cache_size: usize) -> Self {
        Self {
            pool,
            cache: RwLock::new(DedupCache::new(cache_size)),
        }
    }

    async fn remember(&self, external_id: &str) {
        self.cache.write().await.insert(external_id.to_string());
    }
}

#[async_trait]
impl DedupStore for PgDedupStore {
    async fn exists(&self, external_id: &str) -> StorageResult<bool> {
        if self.cache.read().await.contains(external_id) {
            return Ok(true);
        }

        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM dedup_records WHERE external_id = $1)",
                &[&external_id],
            )
            .await?;
        let found: bool = row.get(0);

        if found {
            self.remember(external_id).await;
        }
        Ok(found)
    }

    async fn insert_if_absent(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool> {
        let client = self.pool.get().await?;
        let inserted = client
            .execute(
                r#"
                INSERT INTO dedup_records (external_id, campaign_id, discovered_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (external_id) DO NOTHING
                "#,
                &[&external_id, &campaign_id],
            )
            .await?;

        self.remember(external_id).await;

        if inserted == 0 {
            tracing::debug!(external_id, "Identifier already recorded by another campaign");
        }
        Ok(inserted == 1)
    }

    async fn get(&self, external_id: &str) -> StorageResult<Option<DedupRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT external_id, campaign_id, discovered_at FROM dedup_records \
                 WHERE external_id = $1",
                &[&external_id],
            )
            .await?;

        Ok(row.map(|row| DedupRecord {
            external_id: row.get("external_id"),
            campaign_id: row.get("campaign_id"),
            discovered_at: row.get("discovered_at"),
        }))
    }

    async fn release(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool> {
        let client = self.pool.get().await?;
        let removed = client
            .execute(
                "DELETE FROM dedup_records WHERE external_id = $1 AND campaign_id = $2",
                &[&external_id, &campaign_id],
            )
            .await?;

        // Drop the hint even when another campaign owns the row; exists() re-checks
        self.cache.write().await.remove(external_id);
        Ok(removed == 1)
    }
}
