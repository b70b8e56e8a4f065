//! PostgreSQL campaign and lead storage
//!
//! Lifecycle transitions are single `UPDATE ... WHERE <precondition>
//! RETURNING` statements, so two workers racing on the same campaign cannot
//! both claim it.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use super::{CampaignStore, LeadStore, StorageError, StorageResult};
use crate::campaign::Transition;
use crate::models::{Campaign, CampaignStatus, Lead, LeadStatus, SearchFilters};

const CAMPAIGN_COLUMNS: &str = "id, name, search_query, company, past_company, school, status, \
     is_searched, processing, total_results, lead_ids, run_count, last_run, schedule, \
     is_scheduled, created_by, created_at, updated_at";

const LEAD_COLUMNS: &str = "id, external_id, campaign_id, status, created_at, updated_at";

/// SQL for the pickup predicate; must agree with `campaign::is_eligible`
const ELIGIBLE_PREDICATE: &str =
    "is_scheduled AND NOT processing AND status IN ('CREATED', 'FAILED')";

/// Schema for all tables the crawler reads and writes
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    search_query TEXT NOT NULL,
    company TEXT,
    past_company TEXT,
    school TEXT,
    status VARCHAR(16) NOT NULL DEFAULT 'CREATED',
    is_searched BOOLEAN NOT NULL DEFAULT FALSE,
    processing BOOLEAN NOT NULL DEFAULT FALSE,
    total_results BIGINT,
    lead_ids UUID[] NOT NULL DEFAULT '{}',
    run_count INTEGER NOT NULL DEFAULT 0,
    last_run TIMESTAMPTZ,
    schedule TEXT,
    is_scheduled BOOLEAN NOT NULL DEFAULT TRUE,
    created_by TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_campaigns_eligible
    ON campaigns(created_at)
    WHERE is_scheduled AND NOT processing;

CREATE TABLE IF NOT EXISTS leads (
    id UUID PRIMARY KEY,
    external_id VARCHAR(255) NOT NULL UNIQUE,
    campaign_id UUID NOT NULL REFERENCES campaigns(id),
    status VARCHAR(16) NOT NULL DEFAULT 'CREATED',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_leads_campaign
    ON leads(campaign_id, created_at);

CREATE TABLE IF NOT EXISTS dedup_records (
    external_id VARCHAR(255) PRIMARY KEY,
    campaign_id UUID NOT NULL,
    discovered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Create all tables and indexes if they do not exist
pub async fn init_schema(pool: &Pool) -> StorageResult<()> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("Database schema initialized");
    Ok(())
}

/// PostgreSQL-backed campaign and lead store
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn campaign_from_row(row: &Row) -> StorageResult<Campaign> {
    let status: String = row.try_get("status")?;
    let status = CampaignStatus::parse(&status).ok_or(StorageError::InvalidData {
        field: "campaigns.status",
        value: status,
    })?;
    let run_count: i32 = row.try_get("run_count")?;

    Ok(Campaign {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        search_query: row.try_get("search_query")?,
        filters: SearchFilters {
            company: row.try_get("company")?,
            past_company: row.try_get("past_company")?,
            school: row.try_get("school")?,
        },
        status,
        is_searched: row.try_get("is_searched")?,
        processing: row.try_get("processing")?,
        total_results: row.try_get("total_results")?,
        lead_ids: row.try_get("lead_ids")?,
        run_count: u32::try_from(run_count).unwrap_or(0),
        last_run: row.try_get("last_run")?,
        schedule: row.try_get("schedule")?,
        is_scheduled: row.try_get("is_scheduled")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn lead_from_row(row: &Row) -> StorageResult<Lead> {
    let status: String = row.try_get("status")?;
    let status = LeadStatus::parse(&status).ok_or(StorageError::InvalidData {
        field: "leads.status",
        value: status,
    })?;

    Ok(Lead {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        campaign_id: row.try_get("campaign_id")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CampaignStore for PgStore {
    async fn insert_campaign(&self, campaign: &Campaign) -> StorageResult<()> {
        let client = self.pool.get().await?;
        let run_count = i32::try_from(campaign.run_count).unwrap_or(i32::MAX);

        client
            .execute(
                r#"
                INSERT INTO campaigns (id, name, search_query, company, past_company, school,
                    status, is_searched, processing, total_results, lead_ids, run_count,
                    last_run, schedule, is_scheduled, created_by, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18)
                "#,
                &[
                    &campaign.id,
                    &campaign.name,
                    &campaign.search_query,
                    &campaign.filters.company,
                    &campaign.filters.past_company,
                    &campaign.filters.school,
                    &campaign.status.as_str(),
                    &campaign.is_searched,
                    &campaign.processing,
                    &campaign.total_results,
                    &campaign.lead_ids,
                    &run_count,
                    &campaign.last_run,
                    &campaign.schedule,
                    &campaign.is_scheduled,
                    &campaign.created_by,
                    &campaign.created_at,
                    &campaign.updated_at,
                ],
            )
            .await?;

        Ok(())
    }

    async fn get_campaign(&self, id: Uuid) -> StorageResult<Option<Campaign>> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1");
        let row = client.query_opt(&query, &[&id]).await?;
        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn find_eligible(&self, limit: usize) -> StorageResult<Vec<Campaign>> {
        let client = self.pool.get().await?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let query = format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE {ELIGIBLE_PREDICATE} \
             ORDER BY created_at, id LIMIT $1"
        );
        let rows = client.query(&query, &[&limit]).await?;
        rows.iter().map(campaign_from_row).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> StorageResult<Option<Campaign>> {
        let client = self.pool.get().await?;

        let row = match transition {
            Transition::Pickup { at } => {
                let query = format!(
                    "UPDATE campaigns SET processing = TRUE, updated_at = $2 \
                     WHERE id = $1 AND {ELIGIBLE_PREDICATE} \
                     RETURNING {CAMPAIGN_COLUMNS}"
                );
                client.query_opt(&query, &[&id, at]).await?
            }
            Transition::Complete {
                lead_ids,
                total_results,
                at,
            } => {
                let query = format!(
                    "UPDATE campaigns SET is_searched = TRUE, status = 'COMPLETED', \
                     processing = FALSE, last_run = $2, run_count = run_count + 1, \
                     lead_ids = lead_ids || $3::uuid[], \
                     total_results = COALESCE($4, total_results), updated_at = $2 \
                     WHERE id = $1 AND processing \
                     RETURNING {CAMPAIGN_COLUMNS}"
                );
                client
                    .query_opt(&query, &[&id, at, lead_ids, total_results])
                    .await?
            }
            Transition::Fail { at } => {
                let query = format!(
                    "UPDATE campaigns SET status = 'FAILED', processing = FALSE, \
                     last_run = $2, updated_at = $2 \
                     WHERE id = $1 AND processing \
                     RETURNING {CAMPAIGN_COLUMNS}"
                );
                client.query_opt(&query, &[&id, at]).await?
            }
        };

        match row {
            Some(row) => campaign_from_row(&row).map(Some),
            None => {
                // Distinguish "precondition failed" from "no such campaign"
                let exists = client
                    .query_one("SELECT EXISTS(SELECT 1 FROM campaigns WHERE id = $1)", &[&id])
                    .await?;
                if exists.get::<_, bool>(0) {
                    Ok(None)
                } else {
                    Err(StorageError::CampaignNotFound(id))
                }
            }
        }
    }
}

#[async_trait]
impl LeadStore for PgStore {
    async fn create_lead(&self, lead: &Lead) -> StorageResult<()> {
        let client = self.pool.get().await?;

        client
            .execute(
                r#"
                INSERT INTO leads (id, external_id, campaign_id, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &lead.id,
                    &lead.external_id,
                    &lead.campaign_id,
                    &lead.status.as_str(),
                    &lead.created_at,
                    &lead.updated_at,
                ],
            )
            .await?;

        Ok(())
    }

    async fn leads_for_campaign(&self, campaign_id: Uuid) -> StorageResult<Vec<Lead>> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE campaign_id = $1 ORDER BY created_at, id"
        );
        let rows = client.query(&query, &[&campaign_id]).await?;
        rows.iter().map(lead_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligible_predicate_matches_model() {
        // The SQL predicate must name exactly the runnable statuses
        for status in [
            CampaignStatus::Created,
            CampaignStatus::Completed,
            CampaignStatus::Failed,
            CampaignStatus::Cancelled,
        ] {
            let quoted = format!("'{}'", status.as_str());
            assert_eq!(
                ELIGIBLE_PREDICATE.contains(&quoted),
                status.is_runnable(),
                "status {status}"
            );
        }
    }

    #[test]
    fn test_schema_declares_unique_external_ids() {
        assert!(SCHEMA.contains("external_id VARCHAR(255) NOT NULL UNIQUE"));
        assert!(SCHEMA.contains("external_id VARCHAR(255) PRIMARY KEY"));
    }
}
