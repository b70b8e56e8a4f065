//! Campaign lifecycle management
//!
//! [`state`] holds the pure transition rules. [`CampaignStateMachine`] selects
//! eligible campaigns and persists transitions through a [`CampaignStore`],
//! which applies each transition as one conditional update.

pub mod state;

use std::sync::Arc;

use uuid::Uuid;

use crate::models::Campaign;
use crate::storage::{CampaignStore, StorageResult};

pub use state::{is_eligible, StateError, Transition};

/// Persists campaign lifecycle transitions
#[derive(Clone)]
pub struct CampaignStateMachine {
    store: Arc<dyn CampaignStore>,
}

impl CampaignStateMachine {
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self { store }
    }

    /// Eligible campaigns, oldest first, bounded by `limit`
    pub async fn eligible(&self, limit: usize) -> StorageResult<Vec<Campaign>> {
        self.store.find_eligible(limit).await
    }

    /// Claim a campaign for crawling.
    ///
    /// Returns `None` when another worker claimed it first or it stopped being
    /// eligible since it was selected.
    pub async fn pickup(&self, id: Uuid) -> StorageResult<Option<Campaign>> {
        let claimed = self.store.transition(id, &Transition::pickup()).await?;
        match &claimed {
            Some(_) => tracing::debug!(campaign_id = %id, "Campaign picked up"),
            None => tracing::info!(campaign_id = %id, "Campaign no longer eligible, skipping"),
        }
        Ok(claimed)
    }

    /// Record a successful crawl, appending this run's lead ids
    pub async fn complete(
        &self,
        id: Uuid,
        lead_ids: Vec<Uuid>,
        total_results: Option<i64>,
    ) -> StorageResult<Option<Campaign>> {
        let new_leads = lead_ids.len();
        let updated = self
            .store
            .transition(id, &Transition::complete(lead_ids, total_results))
            .await?;

        if updated.is_none() {
            tracing::warn!(campaign_id = %id, "Campaign was not processing when completing");
        } else {
            tracing::info!(campaign_id = %id, new_leads, "Campaign completed");
        }

        Ok(updated)
    }

    /// Record a failed crawl
    pub async fn fail(&self, id: Uuid) -> StorageResult<Option<Campaign>> {
        let updated = self.store.transition(id, &Transition::fail()).await?;

        if updated.is_none() {
            tracing::warn!(campaign_id = %id, "Campaign was not processing when failing");
        } else {
            tracing::warn!(campaign_id = %id, "Campaign marked as failed");
        }

        Ok(updated)
    }
}
