//! prospector - campaign-driven lead discovery crawler
//!
//! Periodically selects eligible search campaigns, drives an already
//! authenticated browser session through paginated search results, records
//! each newly discovered profile exactly once, and hands campaigns with new
//! leads to a downstream enrichment queue.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`scheduler`] - Lock-guarded periodic entry point
//! - [`crawler`] - Paginated search/extract/dedup/persist loop
//! - [`campaign`] - Campaign lifecycle transitions
//! - [`lock`] - Cluster-wide mutual exclusion (Redis, in-memory)
//! - [`storage`] - Campaign, lead and dedup persistence (PostgreSQL, in-memory)
//! - [`enrichment`] - Handoff queue for the enrichment stage
//! - [`browser`] - Browser automation capability and Chromium adapter
//! - [`config`] - Configuration management and settings
//! - [`metrics`] / [`server`] - Prometheus metrics and the health endpoint
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use prospector::config::Config;
//! use prospector::crawler::CrawlEngine;
//! use prospector::lock::InMemoryLockManager;
//! use prospector::scheduler::Scheduler;
//! use prospector::storage::{InMemoryStore, Stores};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let stores = Stores::in_memory(Arc::new(InMemoryStore::new()));
//!     let engine = CrawlEngine::new(&stores, config.crawl.clone());
//!     let _scheduler = Scheduler::new(
//!         Arc::new(InMemoryLockManager::new()),
//!         engine,
//!         config.scheduler.clone(),
//!     )?;
//!     // scheduler.run_tick(&mut browser).await?;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod campaign;
pub mod config;
pub mod crawler;
pub mod enrichment;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod server;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::browser::{BrowserHandle, BrowserProvider};
    pub use crate::config::Config;
    pub use crate::crawler::{CrawlEngine, CrawlOutcome, CrawlReport};
    pub use crate::error::{Error, ErrorCategory, ProspectorErrorTrait, Result};
    pub use crate::lock::LockManager;
    pub use crate::models::{Campaign, CampaignStatus, Lead, SearchFilters};
    pub use crate::scheduler::{Scheduler, TickReport};
    pub use crate::storage::Stores;
}

// Direct re-exports for convenience
pub use error::{Error, Result};
pub use models::{Campaign, CampaignStatus, Lead, LeadStatus};
