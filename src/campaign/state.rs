//! Campaign lifecycle rules
//!
//! The observable state of a campaign is the pair `(status, processing)`:
//!
//! ```text
//!   CREATED ──pickup──▶ CREATED+processing ──success──▶ COMPLETED
//!                                          └─failure──▶ FAILED
//!   FAILED  ──pickup──▶ FAILED+processing  ──...
//!   CANCELLED (set externally, never picked up)
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Campaign, CampaignStatus};

/// A lifecycle transition applied during a run
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Claim an eligible campaign for a crawl
    Pickup { at: DateTime<Utc> },

    /// Crawl finished normally
    Complete {
        /// Leads produced by this run, appended to the campaign's list
        lead_ids: Vec<Uuid>,
        /// Result count read from the search page, if any
        total_results: Option<i64>,
        at: DateTime<Utc>,
    },

    /// Crawl aborted by an unhandled fault
    Fail { at: DateTime<Utc> },
}

impl Transition {
    pub fn pickup() -> Self {
        Self::Pickup { at: Utc::now() }
    }

    pub fn complete(lead_ids: Vec<Uuid>, total_results: Option<i64>) -> Self {
        Self::Complete {
            lead_ids,
            total_results,
            at: Utc::now(),
        }
    }

    pub fn fail() -> Self {
        Self::Fail { at: Utc::now() }
    }

    /// Whether the transition may be applied to the campaign as it is now
    pub fn check(&self, campaign: &Campaign) -> Result<(), StateError> {
        match self {
            Self::Pickup { .. } if !is_eligible(campaign) => Err(StateError::NotEligible {
                id: campaign.id,
                status: campaign.status,
                processing: campaign.processing,
                scheduled: campaign.is_scheduled,
            }),
            Self::Complete { .. } | Self::Fail { .. } if !campaign.processing => {
                Err(StateError::NotProcessing { id: campaign.id })
            }
            _ => Ok(()),
        }
    }

    /// Apply the transition in place
    pub fn apply(&self, campaign: &mut Campaign) -> Result<(), StateError> {
        self.check(campaign)?;

        match self {
            Self::Pickup { at } => {
                campaign.processing = true;
                campaign.updated_at = *at;
            }
            Self::Complete {
                lead_ids,
                total_results,
                at,
            } => {
                campaign.is_searched = true;
                campaign.status = CampaignStatus::Completed;
                campaign.processing = false;
                campaign.last_run = Some(*at);
                campaign.run_count += 1;
                campaign.lead_ids.extend(lead_ids.iter().copied());
                if total_results.is_some() {
                    campaign.total_results = *total_results;
                }
                campaign.updated_at = *at;
            }
            Self::Fail { at } => {
                // run_count only counts successful runs
                campaign.status = CampaignStatus::Failed;
                campaign.processing = false;
                campaign.last_run = Some(*at);
                campaign.updated_at = *at;
            }
        }

        Ok(())
    }
}

/// Pickup predicate: scheduled, idle, and CREATED or FAILED
pub fn is_eligible(campaign: &Campaign) -> bool {
    campaign.is_scheduled && !campaign.processing && campaign.status.is_runnable()
}

/// Rejected transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Campaign {id} is not eligible for pickup (status={status}, processing={processing}, scheduled={scheduled})")]
    NotEligible {
        id: Uuid,
        status: CampaignStatus,
        processing: bool,
        scheduled: bool,
    },

    #[error("Campaign {id} is not processing")]
    NotProcessing { id: Uuid },
}
