//! Persistence for campaigns, leads and dedup records
//!
//! Business logic only sees the repository traits below. Two backends
//! implement them:
//!
//! ```text
//!                ┌──────────────────────────────────────────┐
//!                │  CampaignStore   LeadStore   DedupStore  │
//!                └──────────────────────────────────────────┘
//!                         │                       │
//!              ┌──────────▼─────────┐   ┌─────────▼─────────┐
//!              │    PostgreSQL      │   │     In-memory     │
//!              │ (postgres, dedup)  │   │     (memory)      │
//!              └────────────────────┘   └───────────────────┘
//! ```
//!
//! - [`postgres`] - campaign and lead tables, schema initialization
//! - [`dedup`] - global dedup set with a positive-hit cache
//! - [`memory`] - single-process store used by tests and dry runs

pub mod dedup;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::campaign::Transition;
use crate::config::DatabaseConfig;
use crate::models::{Campaign, DedupRecord, Lead};

pub use dedup::PgDedupStore;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// A uniqueness constraint rejected the write
    #[error("Duplicate key: {0}")]
    Duplicate(String),

    /// Campaign does not exist
    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// Could not obtain a pooled connection
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Query failed
    #[error("Database query failed: {0}")]
    Query(tokio_postgres::Error),

    /// A stored value could not be mapped back to the model
    #[error("Invalid stored value for {field}: {value}")]
    InvalidData { field: &'static str, value: String },
}

impl StorageError {
    /// True for uniqueness violations, which callers treat as "already handled"
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Check if retrying later might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Pool(_) | Self::Query(_))
    }
}

impl From<tokio_postgres::Error> for StorageError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let constraint = err
                .as_db_error()
                .and_then(|db| db.constraint())
                .unwrap_or("unique")
                .to_string();
            return Self::Duplicate(constraint);
        }
        Self::Query(err)
    }
}

impl From<deadpool_postgres::PoolError> for StorageError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

// ============================================================================
// Repository Traits
// ============================================================================

/// Campaign persistence
///
/// State-changing operations go through [`CampaignStore::transition`], which
/// must apply the transition only when its precondition still holds in the
/// store (a single conditional update, never read-then-write).
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Insert a new campaign
    async fn insert_campaign(&self, campaign: &Campaign) -> StorageResult<()>;

    /// Load a campaign by id
    async fn get_campaign(&self, id: Uuid) -> StorageResult<Option<Campaign>>;

    /// Campaigns eligible for pickup, oldest first, at most `limit`
    async fn find_eligible(&self, limit: usize) -> StorageResult<Vec<Campaign>>;

    /// Atomically apply a transition.
    ///
    /// Returns the updated campaign, or `None` if the campaign exists but the
    /// transition's precondition did not match.
    async fn transition(&self, id: Uuid, transition: &Transition)
        -> StorageResult<Option<Campaign>>;
}

/// Candidate record persistence
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Create a lead. A lead for the same external id yields `StorageError::Duplicate`.
    async fn create_lead(&self, lead: &Lead) -> StorageResult<()>;

    /// Leads owned by a campaign, in creation order
    async fn leads_for_campaign(&self, campaign_id: Uuid) -> StorageResult<Vec<Lead>>;
}

/// Global set of previously seen external identifiers
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Whether the identifier has ever been seen by any campaign
    async fn exists(&self, external_id: &str) -> StorageResult<bool>;

    /// Record the identifier for `campaign_id` unless already present.
    ///
    /// Returns true if this call inserted it. A concurrent insert of the same
    /// identifier returns false rather than an error.
    async fn insert_if_absent(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool>;

    /// Load the record for an identifier
    async fn get(&self, external_id: &str) -> StorageResult<Option<DedupRecord>>;

    /// Drop the record if `campaign_id` still owns it.
    ///
    /// Used when the lead for a freshly recorded identifier could not be
    /// written, so a later run can discover it again. Returns true if a
    /// record was removed.
    async fn release(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool>;
}

/// Shared handles to every store the engine needs
#[derive(Clone)]
pub struct Stores {
    pub campaigns: Arc<dyn CampaignStore>,
    pub leads: Arc<dyn LeadStore>,
    pub dedup: Arc<dyn DedupStore>,
}

impl Stores {
    /// Use one in-memory store for all three roles
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            campaigns: store.clone(),
            leads: store.clone(),
            dedup: store,
        }
    }

    /// PostgreSQL-backed stores sharing a single pool
    pub fn postgres(pool: Pool) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self {
            campaigns: store.clone(),
            leads: store,
            dedup: Arc::new(PgDedupStore::new(pool)),
        }
    }
}

/// Create the PostgreSQL connection pool
pub fn create_pool(config: &DatabaseConfig) -> StorageResult<Pool> {
    let mut cfg = PoolConfig::new();
    cfg.url = Some(config.postgres_url.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(config.pool_size));

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| StorageError::Pool(e.to_string()))
}
