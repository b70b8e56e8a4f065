// Core data structures for the prospector crawler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored lifecycle status of a campaign
///
/// "Processing" is not a status: it is tracked by [`Campaign::processing`]
/// so that the stored status always reflects the outcome of the last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Created,
    Completed,
    Failed,
    Cancelled,
}

impl CampaignStatus {
    /// Get string representation (as stored in the database)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse from the stored representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREATED" => Some(Self::Created),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" | "CANCELED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Statuses a scheduled campaign may be picked up from
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Created | Self::Failed)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional narrowing filters applied on the search page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub company: Option<String>,
    pub past_company: Option<String>,
    pub school: Option<String>,
}

impl SearchFilters {
    /// True when no filter carries a non-blank value
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Non-blank filters as (kind, value) pairs, in panel order
    pub fn entries(&self) -> Vec<(FilterKind, &str)> {
        [
            (FilterKind::Company, self.company.as_deref()),
            (FilterKind::PastCompany, self.past_company.as_deref()),
            (FilterKind::School, self.school.as_deref()),
        ]
        .into_iter()
        .filter_map(|(kind, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (kind, v))
        })
        .collect()
    }
}

/// Kinds of search filters a campaign may set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    Company,
    PastCompany,
    School,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::PastCompany => "past_company",
            Self::School => "school",
        }
    }
}

/// A unit of scheduled discovery work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub search_query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    pub status: CampaignStatus,
    /// Set once a search pass has completed
    pub is_searched: bool,
    /// Set only while a crawl is active
    pub processing: bool,
    /// Best-effort result count read from the search page
    pub total_results: Option<i64>,
    /// Leads produced by this campaign, in discovery order
    #[serde(default)]
    pub lead_ids: Vec<Uuid>,
    pub run_count: u32,
    pub last_run: Option<DateTime<Utc>>,
    /// Informational schedule label (e.g. "daily")
    pub schedule: Option<String>,
    pub is_scheduled: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a new, scheduled campaign in the CREATED state
    pub fn new(name: impl Into<String>, search_query: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            search_query: search_query.into(),
            filters: SearchFilters::default(),
            status: CampaignStatus::Created,
            is_searched: false,
            processing: false,
            total_results: None,
            lead_ids: Vec::new(),
            run_count: 0,
            last_run: None,
            schedule: None,
            is_scheduled: true,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set search filters
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the company filter
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.filters.company = Some(company.into());
        self
    }

    /// Set the scheduled flag
    pub fn with_scheduled(mut self, scheduled: bool) -> Self {
        self.is_scheduled = scheduled;
        self
    }

    /// Set the stored status
    pub fn with_status(mut self, status: CampaignStatus) -> Self {
        self.status = status;
        self
    }
}

/// Lifecycle status of a discovered candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    Created,
    Enriched,
    Failed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Enriched => "ENRICHED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CREATED" => Some(Self::Created),
            "ENRICHED" => Some(Self::Enriched),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A discovered external profile ("candidate record")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    /// Canonical identifier of the profile on the external source
    pub external_id: String,
    pub campaign_id: Uuid,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Create a new lead in the CREATED state
    pub fn new(external_id: impl Into<String>, campaign_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            campaign_id,
            status: LeadStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Global marker preventing re-discovery of an external identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub external_id: String,
    /// Campaign that first discovered the identifier
    pub campaign_id: Uuid,
    pub discovered_at: DateTime<Utc>,
}

impl DedupRecord {
    pub fn new(external_id: impl Into<String>, campaign_id: Uuid) -> Self {
        Self {
            external_id: external_id.into(),
            campaign_id,
            discovered_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_status_roundtrip_strings() {
        for status in [
            CampaignStatus::Created,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
            CampaignStatus::Cancelled,
        ] {
            assert_eq!(CampaignStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CampaignStatus::parse("canceled"), Some(CampaignStatus::Cancelled));
        assert_eq!(CampaignStatus::parse("PROCESSING"), None);
    }

    #[test]
    fn test_runnable_statuses() {
        assert!(CampaignStatus::Created.is_runnable());
        assert!(CampaignStatus::Failed.is_runnable());
        assert!(!CampaignStatus::Completed.is_runnable());
        assert!(!CampaignStatus::Cancelled.is_runnable());
    }

    #[test]
    fn test_filters_skip_blank_values() {
        let filters = SearchFilters {
            company: Some("Acme".to_string()),
            past_company: Some("   ".to_string()),
            school: None,
        };
        let entries = filters.entries();
        assert_eq!(entries, vec![(FilterKind::Company, "Acme")]);
        assert!(!filters.is_empty());
        assert!(SearchFilters::default().is_empty());
    }

    #[test]
    fn test_new_campaign_defaults() {
        let campaign = Campaign::new("Backend hires", "software engineer").with_company("Acme");
        assert_eq!(campaign.status, CampaignStatus::Created);
        assert!(campaign.is_scheduled);
        assert!(!campaign.processing);
        assert_eq!(campaign.run_count, 0);
        assert_eq!(campaign.filters.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_campaign_status_serde() {
        let json = serde_json::to_string(&CampaignStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
