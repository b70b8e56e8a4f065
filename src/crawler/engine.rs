//! Campaign crawl loop
//!
//! One call to [`CrawlEngine::execute`] runs a claimed campaign end to end:
//!
//! ```text
//! search URL ─▶ filters (best effort) ─▶ result count (best effort)
//!     ─▶ page loop { scroll, settle, entries ─▶ dedup ─▶ lead } ─▶ next?
//!     ─▶ complete (append leads) ─▶ enrichment handoff
//!        or
//!     ─▶ fail
//! ```
//!
//! `execute` always returns a [`CrawlReport`]. A fault that escapes the page
//! loop marks the campaign FAILED; leads committed before the fault stay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use super::error::{CrawlError, CrawlResult};
use super::pacing::Pacing;
use super::page::PageAdapter;
use super::sink::ResultSink;
use crate::browser::BrowserHandle;
use crate::campaign::CampaignStateMachine;
use crate::config::CrawlConfig;
use crate::enrichment::{EnrichmentQueue, EnrichmentRequest};
use crate::metrics;
use crate::models::{Campaign, Lead};
use crate::storage::{DedupStore, LeadStore, Stores};

/// How a run ended for the campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    Completed,
    Failed,
}

impl CrawlOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The first page had no entries
    NoResults,
    /// A later page had no entries
    EndOfResults,
    /// The "next" control was absent, disabled or not clickable
    LastPage,
    /// The configured page cap was reached
    PageCap,
    /// A fault aborted the run
    Fault,
}

/// Summary of one campaign run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub campaign_id: Uuid,
    pub outcome: CrawlOutcome,
    pub stop_reason: StopReason,
    pub pages_visited: u32,
    /// Leads committed during the run, including those of a failed run
    pub new_leads: usize,
    /// Entries whose identifier was already known
    pub duplicates_skipped: usize,
    /// Entries dropped after an extraction or persistence error
    pub entries_skipped: usize,
    pub total_results: Option<i64>,
    pub enrichment_requested: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == CrawlOutcome::Completed
    }
}

/// Mutable counters for a run in progress
#[derive(Debug, Default)]
struct Progress {
    pages_visited: u32,
    duplicates_skipped: usize,
    entries_skipped: usize,
    total_results: Option<i64>,
}

/// What happened to one result entry
#[derive(Debug, Clone, PartialEq, Eq)]
enum EntryOutcome {
    Created(Uuid),
    SeenThisRun,
    AlreadyKnown,
}

/// Paginated search, extract, dedup and persist loop
pub struct CrawlEngine {
    state: CampaignStateMachine,
    leads: Arc<dyn LeadStore>,
    dedup: Arc<dyn DedupStore>,
    enrichment: Option<Arc<dyn EnrichmentQueue>>,
    enrichment_batch_size: u32,
    page: PageAdapter,
    pacing: Pacing,
    page_cap: u32,
    scroll_steps: u32,
    scroll_px: u32,
}

impl CrawlEngine {
    pub fn new(stores: &Stores, config: CrawlConfig) -> Self {
        Self {
            state: CampaignStateMachine::new(stores.campaigns.clone()),
            leads: stores.leads.clone(),
            dedup: stores.dedup.clone(),
            enrichment: None,
            enrichment_batch_size: 0,
            pacing: Pacing::from_config(&config),
            page_cap: config.page_cap.max(1),
            scroll_steps: config.scroll_steps,
            scroll_px: config.scroll_px,
            page: PageAdapter::new(config),
        }
    }

    /// Hand campaigns with new leads to an enrichment queue
    pub fn with_enrichment(mut self, queue: Arc<dyn EnrichmentQueue>, max_batch_size: u32) -> Self {
        self.enrichment = Some(queue);
        self.enrichment_batch_size = max_batch_size;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// The state machine used to persist transitions
    pub fn state(&self) -> &CampaignStateMachine {
        &self.state
    }

    /// Crawl a campaign that has already been picked up.
    ///
    /// Never returns an error: faults are recorded on the campaign and in
    /// the report.
    pub async fn execute<B: BrowserHandle>(
        &self,
        campaign: &Campaign,
        browser: &mut B,
    ) -> CrawlReport {
        let started = Instant::now();
        let mut sink = ResultSink::new();
        let mut progress = Progress::default();

        tracing::info!(
            campaign_id = %campaign.id,
            name = %campaign.name,
            query = %campaign.search_query,
            "Starting campaign crawl"
        );

        let result = self
            .crawl(campaign, browser, &mut sink, &mut progress)
            .await;

        let new_leads = sink.len();
        let mut report = CrawlReport {
            campaign_id: campaign.id,
            outcome: CrawlOutcome::Completed,
            stop_reason: StopReason::Fault,
            pages_visited: progress.pages_visited,
            new_leads,
            duplicates_skipped: progress.duplicates_skipped,
            entries_skipped: progress.entries_skipped,
            total_results: progress.total_results,
            enrichment_requested: false,
            error: None,
            elapsed: Duration::ZERO,
        };

        match result {
            Ok(stop) => {
                report.stop_reason = stop;
                self.finish_success(campaign, sink.drain(), &mut report).await;
            }
            Err(err) => {
                tracing::error!(
                    campaign_id = %campaign.id,
                    page = progress.pages_visited,
                    committed_leads = new_leads,
                    error = %err,
                    "Campaign crawl aborted"
                );
                metrics::record_error(&err);
                report.error = Some(err.to_string());
                self.finish_failure(campaign, &mut report).await;
            }
        }

        report.elapsed = started.elapsed();
        metrics::record_campaign_run(report.outcome.as_str());

        tracing::info!(
            campaign_id = %campaign.id,
            outcome = report.outcome.as_str(),
            stop_reason = ?report.stop_reason,
            pages = report.pages_visited,
            new_leads = report.new_leads,
            duplicates = report.duplicates_skipped,
            skipped = report.entries_skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Campaign crawl finished"
        );

        report
    }

    async fn crawl<B: BrowserHandle>(
        &self,
        campaign: &Campaign,
        browser: &mut B,
        sink: &mut ResultSink,
        progress: &mut Progress,
    ) -> CrawlResult<StopReason> {
        let search_url = self.page.search_url(&campaign.search_query)?;
        browser.navigate(&search_url).await?;
        self.pacing.settle().await;

        if !campaign.filters.is_empty() {
            if let Err(e) = self
                .page
                .apply_filters(browser, &campaign.filters, &self.pacing)
                .await
            {
                tracing::warn!(
                    campaign_id = %campaign.id,
                    error = %e,
                    "Could not apply search filters, continuing with unfiltered search"
                );
                browser.navigate(&search_url).await?;
                self.pacing.settle().await;
            }
        }

        progress.total_results = self.page.read_total_results(browser).await;
        if let Some(total) = progress.total_results {
            tracing::debug!(campaign_id = %campaign.id, total, "Approximate result count");
        }

        let result_entry = self.page.selectors().result_entry.clone();
        let mut page = 1u32;

        loop {
            progress.pages_visited = page;
            metrics::record_page_visited();

            browser.scroll(self.scroll_steps, self.scroll_px).await?;
            self.pacing.settle().await;

            let entries = browser.find_all(&result_entry).await?;
            if entries.is_empty() {
                tracing::debug!(campaign_id = %campaign.id, page, "No result entries on page");
                return Ok(if page == 1 {
                    StopReason::NoResults
                } else {
                    StopReason::EndOfResults
                });
            }

            tracing::debug!(campaign_id = %campaign.id, page, entries = entries.len(), "Processing page");

            for entry in &entries {
                match self.process_entry(campaign, browser, entry, sink).await {
                    Ok(EntryOutcome::Created(lead_id)) => {
                        metrics::record_lead_created();
                        tracing::debug!(campaign_id = %campaign.id, %lead_id, "Lead created");
                    }
                    Ok(EntryOutcome::SeenThisRun | EntryOutcome::AlreadyKnown) => {
                        progress.duplicates_skipped += 1;
                        metrics::record_dedup_hit();
                    }
                    Err(CrawlError::DuplicateIdentifier(external_id)) => {
                        progress.duplicates_skipped += 1;
                        metrics::record_dedup_hit();
                        tracing::debug!(
                            campaign_id = %campaign.id,
                            external_id = %external_id,
                            "Identifier recorded concurrently"
                        );
                    }
                    Err(e) if e.is_recoverable() => {
                        progress.entries_skipped += 1;
                        metrics::record_entry_skipped();
                        metrics::record_error(&e);
                        tracing::warn!(campaign_id = %campaign.id, page, error = %e, "Skipping result entry");
                    }
                    Err(e) => return Err(e),
                }
            }

            if page >= self.page_cap {
                tracing::info!(campaign_id = %campaign.id, page_cap = self.page_cap, "Page cap reached");
                return Ok(StopReason::PageCap);
            }

            if !self.page.advance(browser).await? {
                return Ok(StopReason::LastPage);
            }
            self.pacing.settle().await;
            page += 1;
        }
    }

    async fn process_entry<B: BrowserHandle>(
        &self,
        campaign: &Campaign,
        browser: &mut B,
        entry: &B::Element,
        sink: &mut ResultSink,
    ) -> CrawlResult<EntryOutcome> {
        let link_selector = &self.page.selectors().result_link;

        // A dead session fails the run; a stale or missing element skips the entry
        let link = match browser.find_in(entry, link_selector).await {
            Ok(link) => link,
            Err(e) if e.is_recoverable() => None,
            Err(e) => return Err(e.into()),
        }
        .ok_or_else(|| CrawlError::entity_locate(link_selector.as_str()))?;

        let href = match browser.get_attribute(&link, "href").await {
            Ok(href) => href,
            Err(e) if e.is_recoverable() => return Err(CrawlError::extraction("", e.to_string())),
            Err(e) => return Err(e.into()),
        }
        .ok_or_else(|| CrawlError::extraction("", "link has no href"))?;

        let external_id = self.page.extract_identifier(&href)?;

        if !sink.mark_seen(&external_id) {
            return Ok(EntryOutcome::SeenThisRun);
        }
        if self.dedup.exists(&external_id).await? {
            return Ok(EntryOutcome::AlreadyKnown);
        }
        if !self.dedup.insert_if_absent(&external_id, campaign.id).await? {
            return Err(CrawlError::DuplicateIdentifier(external_id));
        }

        let lead = Lead::new(external_id.as_str(), campaign.id);
        match self.leads.create_lead(&lead).await {
            Ok(()) => {}
            Err(e) if e.is_duplicate() => return Err(CrawlError::DuplicateIdentifier(external_id)),
            Err(e) => {
                // A recorded identifier must have a lead
                if let Err(release_err) = self.dedup.release(&external_id, campaign.id).await {
                    tracing::error!(
                        campaign_id = %campaign.id,
                        external_id = %external_id,
                        error = %release_err,
                        "Failed to release dedup record after lead write failure"
                    );
                }
                return Err(e.into());
            }
        }

        sink.push(lead.id);
        Ok(EntryOutcome::Created(lead.id))
    }

    async fn finish_success(&self, campaign: &Campaign, lead_ids: Vec<Uuid>, report: &mut CrawlReport) {
        match self
            .state
            .complete(campaign.id, lead_ids, report.total_results)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                report.outcome = CrawlOutcome::Failed;
                report.error = Some("campaign was not processing at completion".to_string());
                return;
            }
            Err(e) => {
                tracing::error!(
                    campaign_id = %campaign.id,
                    error = %e,
                    "Failed to persist completion, marking campaign failed"
                );
                metrics::record_error(&e);
                report.error = Some(e.to_string());
                self.finish_failure(campaign, report).await;
                return;
            }
        }

        if report.new_leads > 0 {
            report.enrichment_requested = self.request_enrichment(campaign.id).await;
        }
    }

    async fn finish_failure(&self, campaign: &Campaign, report: &mut CrawlReport) {
        report.outcome = CrawlOutcome::Failed;
        report.stop_reason = StopReason::Fault;

        if let Err(e) = self.state.fail(campaign.id).await {
            // The lock TTL and a later pickup are the only recovery from here
            tracing::error!(
                campaign_id = %campaign.id,
                error = %e,
                "Failed to persist failure transition"
            );
            metrics::record_error(&e);
        }
    }

    async fn request_enrichment(&self, campaign_id: Uuid) -> bool {
        let Some(queue) = &self.enrichment else {
            return false;
        };

        let request = EnrichmentRequest::new(campaign_id, self.enrichment_batch_size);
        match queue.enqueue(&request).await {
            Ok(()) => {
                metrics::record_enrichment_request(true);
                tracing::info!(%campaign_id, "Enrichment requested");
                true
            }
            Err(e) => {
                metrics::record_enrichment_request(false);
                metrics::record_error(&e);
                tracing::warn!(%campaign_id, error = %e, "Failed to enqueue enrichment request");
                false
            }
        }
    }
}
