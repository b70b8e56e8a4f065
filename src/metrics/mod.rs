//! Prometheus metrics for the scheduler and crawl engine
//!
//! This module tracks:
//! - Scheduler: ticks by outcome, tick duration
//! - Errors: by category and recoverability
//! - Crawl engine: campaign runs by outcome, pages visited, leads created,
//!   dedup hits, skipped entries, enrichment handoffs
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or it is never called, every recording function
//! is a no-op.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

use crate::error::ProspectorErrorTrait;

// ============================================================================
// Metrics Storage
// ============================================================================

struct SchedulerMetrics {
    ticks: CounterVec,
    tick_duration: Histogram,
    campaigns_in_flight: Gauge,
    errors: CounterVec,
}

struct CrawlMetrics {
    campaign_runs: CounterVec,
    pages_visited: Counter,
    leads_created: Counter,
    dedup_hits: Counter,
    entries_skipped: Counter,
    enrichment_requests: CounterVec,
}

static SCHEDULER_METRICS: OnceLock<SchedulerMetrics> = OnceLock::new();
static CRAWL_METRICS: OnceLock<CrawlMetrics> = OnceLock::new();
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = prospector::metrics::init_metrics() {
///     tracing::warn!(error = %e, "Metrics initialization failed");
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let scheduler = SchedulerMetrics {
        ticks: register_counter_vec!(
            "prospector_scheduler_ticks_total",
            "Scheduler ticks by outcome",
            &["outcome"]
        )?,
        tick_duration: register_histogram!(
            "prospector_scheduler_tick_duration_seconds",
            "Wall time of a scheduler tick that held the lock",
            vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]
        )?,
        campaigns_in_flight: register_gauge!(
            "prospector_scheduler_campaign_in_flight",
            "Whether a campaign crawl is currently running (1 = yes, 0 = no)"
        )?,
        errors: register_counter_vec!(
            "prospector_errors_total",
            "Errors observed by the scheduler and crawl engine",
            &["category", "recoverable"]
        )?,
    };

    let crawl = CrawlMetrics {
        campaign_runs: register_counter_vec!(
            "prospector_campaign_runs_total",
            "Campaign crawl runs by outcome",
            &["outcome"]
        )?,
        pages_visited: register_counter!(
            "prospector_pages_visited_total",
            "Search result pages visited"
        )?,
        leads_created: register_counter!(
            "prospector_leads_created_total",
            "Candidate records created"
        )?,
        dedup_hits: register_counter!(
            "prospector_dedup_hits_total",
            "Result entries skipped because the identifier was already known"
        )?,
        entries_skipped: register_counter!(
            "prospector_entries_skipped_total",
            "Result entries skipped after an extraction or persistence error"
        )?,
        enrichment_requests: register_counter_vec!(
            "prospector_enrichment_requests_total",
            "Enrichment handoffs by result",
            &["result"]
        )?,
    };

    SCHEDULER_METRICS
        .set(scheduler)
        .map_err(|_| "Scheduler metrics already initialized")?;
    CRAWL_METRICS
        .set(crawl)
        .map_err(|_| "Crawl metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    SCHEDULER_METRICS.get().is_some() && CRAWL_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a finished tick (`ran`, `error`, `lock_contended`, `lock_error`, `browser_unavailable`)
pub fn record_tick(outcome: &str) {
    if let Some(m) = SCHEDULER_METRICS.get() {
        m.ticks.with_label_values(&[outcome]).inc();
    }
}

/// Observe how long a tick held the lock
pub fn observe_tick_duration(secs: f64) {
    if let Some(m) = SCHEDULER_METRICS.get() {
        m.tick_duration.observe(secs);
    }
}

/// Record an error by category and recoverability
pub fn record_error(err: &dyn ProspectorErrorTrait) {
    if let Some(m) = SCHEDULER_METRICS.get() {
        let recoverable = if err.is_recoverable() { "true" } else { "false" };
        m.errors
            .with_label_values(&[err.category().as_str(), recoverable])
            .inc();
    }
}

/// Mark a campaign crawl as started or finished
pub fn set_campaign_in_flight(in_flight: bool) {
    if let Some(m) = SCHEDULER_METRICS.get() {
        m.campaigns_in_flight.set(if in_flight { 1.0 } else { 0.0 });
    }
}

/// Record a campaign run (`completed`, `failed`, `panicked`)
pub fn record_campaign_run(outcome: &str) {
    if let Some(m) = CRAWL_METRICS.get() {
        m.campaign_runs.with_label_values(&[outcome]).inc();
    }
}

/// Record one search result page visited
pub fn record_page_visited() {
    if let Some(m) = CRAWL_METRICS.get() {
        m.pages_visited.inc();
    }
}

/// Record a created lead
pub fn record_lead_created() {
    if let Some(m) = CRAWL_METRICS.get() {
        m.leads_created.inc();
    }
}

/// Record an identifier that was already known
pub fn record_dedup_hit() {
    if let Some(m) = CRAWL_METRICS.get() {
        m.dedup_hits.inc();
    }
}

/// Record a result entry skipped after an error
pub fn record_entry_skipped() {
    if let Some(m) = CRAWL_METRICS.get() {
        m.entries_skipped.inc();
    }
}

/// Record an enrichment handoff attempt
pub fn record_enrichment_request(success: bool) {
    let Some(m) = CRAWL_METRICS.get() else {
        return;
    };

    let result = if success { "enqueued" } else { "error" };
    m.enrichment_requests.with_label_values(&[result]).inc();
}

// ============================================================================
// Tests
// ============================================================================
