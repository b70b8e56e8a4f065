//! In-memory store
//!
//! Implements all three repository traits over mutex-guarded maps. State is
//! lost when the process exits.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{CampaignStore, DedupStore, LeadStore, StorageError, StorageResult};
use crate::campaign::{is_eligible, Transition};
use crate::models::{Campaign, DedupRecord, Lead};

#[derive(Default)]
struct Inner {
    campaigns: HashMap<Uuid, Campaign>,
    leads: Vec<Lead>,
    dedup: HashMap<String, DedupRecord>,
}

/// Single-process implementation of every store
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-update
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of leads across all campaigns
    pub fn lead_count(&self) -> usize {
        self.lock().leads.len()
    }

    /// Number of dedup records
    pub fn dedup_count(&self) -> usize {
        self.lock().dedup.len()
    }

    /// All leads, in creation order
    pub fn all_leads(&self) -> Vec<Lead> {
        self.lock().leads.clone()
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> StorageResult<()> {
        let mut inner = self.lock();
        if inner.campaigns.contains_key(&campaign.id) {
            return Err(StorageError::Duplicate(format!("campaign {}", campaign.id)));
        }
        inner.campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn get_campaign(&self, id: Uuid) -> StorageResult<Option<Campaign>> {
        Ok(self.lock().campaigns.get(&id).cloned())
    }

    async fn find_eligible(&self, limit: usize) -> StorageResult<Vec<Campaign>> {
        let inner = self.lock();
        let mut eligible: Vec<Campaign> = inner
            .campaigns
            .values()
            .filter(|c| is_eligible(c))
            .cloned()
            .collect();
        eligible.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        eligible.truncate(limit);
        Ok(eligible)
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> StorageResult<Option<Campaign>> {
        let mut inner = self.lock();
        let campaign = inner
            .campaigns
            .get_mut(&id)
            .ok_or(StorageError::CampaignNotFound(id))?;

        match transition.apply(campaign) {
            Ok(()) => Ok(Some(campaign.clone())),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl LeadStore for InMemoryStore {
    async fn create_lead(&self, lead: &Lead) -> StorageResult<()> {
        let mut inner = self.lock();
        if inner.leads.iter().any(|l| l.external_id == lead.external_id) {
            return Err(StorageError::Duplicate(format!(
                "lead {}",
                lead.external_id
            )));
        }
        inner.leads.push(lead.clone());
        Ok(())
    }

    async fn leads_for_campaign(&self, campaign_id: Uuid) -> StorageResult<Vec<Lead>> {
        Ok(self
            .lock()
            .leads
            .iter()
            .filter(|l| l.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DedupStore for InMemoryStore {
    async fn exists(&self, external_id: &str) -> StorageResult<bool> {
        Ok(self.lock().dedup.contains_key(external_id))
    }

    async fn insert_if_absent(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool> {
        let mut inner = self.lock();
        if inner.dedup.contains_key(external_id) {
            return Ok(false);
        }
        inner.dedup.insert(
            external_id.to_string(),
            DedupRecord::new(external_id, campaign_id),
        );
        Ok(true)
    }

    async fn get(&self, external_id: &str) -> StorageResult<Option<DedupRecord>> {
        Ok(self.lock().dedup.get(external_id).cloned())
    }

    async fn release(&self, external_id: &str, campaign_id: Uuid) -> StorageResult<bool> {
        let mut inner = self.lock();
        match inner.dedup.get(external_id) {
            Some(record) if record.campaign_id == campaign_id => {
                inner.dedup.remove(external_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
