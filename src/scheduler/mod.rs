//! Timer-driven campaign scheduling
//!
//! A tick is the unit of work triggered by cron (`prospector run`) or by the
//! built-in periodic loop (`prospector serve`):
//!
//! ```text
//! acquire cluster lock ──denied──▶ LockContended
//!        │
//!        ▼
//! eligible campaigns (≤ batch_size, oldest first)
//!        │
//!        ▼  sequentially
//! pickup ─▶ CrawlEngine::execute ─▶ (panics contained, campaign failed)
//!        │
//!        ▼
//! release cluster lock (always)
//! ```

pub mod error;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::browser::{BrowserHandle, BrowserProvider};
use crate::campaign::CampaignStateMachine;
use crate::config::SchedulerConfig;
use crate::crawler::{CrawlEngine, CrawlReport};
use crate::lock::{LockManager, LockResult};
use crate::metrics;
use crate::models::Campaign;

pub use error::{SchedulerError, SchedulerResult};

/// What happened to one selected campaign
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CampaignRun {
    /// The crawl ran; the report carries its outcome
    Crawled(CrawlReport),

    /// Another worker claimed it or it stopped being eligible
    NotClaimed { campaign_id: Uuid },

    /// The pickup write failed
    PickupFailed { campaign_id: Uuid, error: String },

    /// The crawl panicked; the campaign was marked failed
    Panicked { campaign_id: Uuid, message: String },
}

impl CampaignRun {
    pub fn campaign_id(&self) -> Uuid {
        match self {
            Self::Crawled(report) => report.campaign_id,
            Self::NotClaimed { campaign_id }
            | Self::PickupFailed { campaign_id, .. }
            | Self::Panicked { campaign_id, .. } => *campaign_id,
        }
    }
}

/// Result of one scheduler tick
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tick", rename_all = "snake_case")]
pub enum TickReport {
    /// Another worker holds the cluster lock, or the lock backend was unreachable
    LockContended,

    /// The lock was held and the batch processed
    Ran { runs: Vec<CampaignRun> },
}

impl TickReport {
    pub fn runs(&self) -> &[CampaignRun] {
        match self {
            Self::LockContended => &[],
            Self::Ran { runs } => runs,
        }
    }
}

/// Cluster-safe, sequential campaign scheduler
pub struct Scheduler {
    locks: Arc<dyn LockManager>,
    state: CampaignStateMachine,
    engine: CrawlEngine,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        locks: Arc<dyn LockManager>,
        engine: CrawlEngine,
        config: SchedulerConfig,
    ) -> SchedulerResult<Self> {
        if config.batch_size == 0 {
            return Err(SchedulerError::invalid_config("batch_size", "must be positive"));
        }
        if config.lock_ttl_secs == 0 {
            return Err(SchedulerError::invalid_config("lock_ttl_secs", "must be positive"));
        }
        if config.lock_key.trim().is_empty() {
            return Err(SchedulerError::invalid_config("lock_key", "cannot be empty"));
        }

        Ok(Self {
            locks,
            state: engine.state().clone(),
            engine,
            config,
        })
    }

    /// Run one tick with the given browser handle.
    ///
    /// Lock contention is a normal outcome. Errors are a failure to load
    /// eligible campaigns or a panic outside a campaign crawl; the lock is
    /// released before either is returned.
    pub async fn run_tick<B: BrowserHandle>(&self, browser: &mut B) -> SchedulerResult<TickReport> {
        let key = self.config.lock_key.as_str();
        let token = Uuid::new_v4().to_string();

        match self.locks.acquire(key, &token, self.config.lock_ttl_secs).await {
            Ok(true) => {
                tracing::info!(lock_key = key, run_token = %token, "Scheduler lock acquired");
            }
            Ok(false) => {
                tracing::info!(lock_key = key, "Another worker holds the scheduler lock, skipping tick");
                metrics::record_tick("lock_contended");
                return Ok(TickReport::LockContended);
            }
            Err(e) => {
                tracing::warn!(lock_key = key, error = %e, "Lock backend unavailable, skipping tick");
                metrics::record_error(&e);
                metrics::record_tick("lock_error");
                return Ok(TickReport::LockContended);
            }
        }

        let guard = LockGuard {
            locks: self.locks.clone(),
            key: key.to_string(),
            token,
            released: false,
        };

        let started = Instant::now();
        let result = match AssertUnwindSafe(self.run_batch(browser)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Scheduler batch panicked");
                Err(SchedulerError::BatchPanicked(message))
            }
        };

        guard.release().await;

        metrics::observe_tick_duration(started.elapsed().as_secs_f64());

        match result {
            Ok(runs) => {
                metrics::record_tick("ran");
                Ok(TickReport::Ran { runs })
            }
            Err(e) => {
                metrics::record_error(&e);
                metrics::record_tick("error");
                Err(e)
            }
        }
    }

    async fn run_batch<B: BrowserHandle>(&self, browser: &mut B) -> SchedulerResult<Vec<CampaignRun>> {
        let campaigns = self.state.eligible(self.config.batch_size).await?;

        if campaigns.is_empty() {
            tracing::info!("No eligible campaigns");
            return Ok(Vec::new());
        }

        tracing::info!(count = campaigns.len(), "Processing eligible campaigns");

        let mut runs = Vec::with_capacity(campaigns.len());
        for campaign in campaigns {
            runs.push(self.run_campaign(campaign, browser).await);
        }
        Ok(runs)
    }

    async fn run_campaign<B: BrowserHandle>(&self, campaign: Campaign, browser: &mut B) -> CampaignRun {
        let campaign_id = campaign.id;

        let claimed = match self.state.pickup(campaign_id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return CampaignRun::NotClaimed { campaign_id },
            Err(e) => {
                tracing::error!(%campaign_id, error = %e, "Failed to pick up campaign");
                metrics::record_error(&e);
                return CampaignRun::PickupFailed {
                    campaign_id,
                    error: e.to_string(),
                };
            }
        };

        metrics::set_campaign_in_flight(true);
        let outcome = AssertUnwindSafe(self.engine.execute(&claimed, browser))
            .catch_unwind()
            .await;
        metrics::set_campaign_in_flight(false);

        match outcome {
            Ok(report) => CampaignRun::Crawled(report),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(%campaign_id, panic = %message, "Campaign crawl panicked");
                metrics::record_campaign_run("panicked");

                if let Err(e) = self.state.fail(campaign_id).await {
                    tracing::error!(%campaign_id, error = %e, "Failed to mark panicked campaign as failed");
                }
                CampaignRun::Panicked {
                    campaign_id,
                    message,
                }
            }
        }
    }

    /// Tick every `interval_secs` until `shutdown` flips to true.
    ///
    /// The first tick runs immediately. A tick in progress is never
    /// interrupted; shutdown is observed between ticks. `on_tick` sees every
    /// tick that produced a report.
    pub async fn run_periodic<P, F>(&self, provider: &P, mut shutdown: watch::Receiver<bool>, on_tick: F)
    where
        P: BrowserProvider,
        F: Fn(&TickReport),
    {
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        tracing::info!(interval_secs = interval.as_secs(), "Scheduler loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Some(report) = self.tick_with_provider(provider).await {
                on_tick(&report);
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler loop stopped");
    }

    async fn tick_with_provider<P: BrowserProvider>(&self, provider: &P) -> Option<TickReport> {
        let mut browser = match provider.acquire().await {
            Ok(browser) => browser,
            Err(e) => {
                tracing::error!(error = %e, "No browser session available, skipping tick");
                metrics::record_error(&e);
                metrics::record_tick("browser_unavailable");
                return None;
            }
        };

        match self.run_tick(&mut browser).await {
            Ok(report) => {
                log_tick(&report);
                Some(report)
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduler tick failed");
                None
            }
        }
    }
}

/// Cluster lock held for the duration of one tick
///
/// Released explicitly at the end of the tick. If the tick future is dropped
/// first, the release runs on a spawned task instead.
struct LockGuard {
    locks: Arc<dyn LockManager>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    async fn release(mut self) {
        self.released = true;
        let outcome = self.locks.release(&self.key, &self.token).await;
        log_release(&self.key, outcome);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(lock_key = %self.key, "No runtime to release scheduler lock, leaving it to expire");
            return;
        };

        tracing::warn!(lock_key = %self.key, "Tick dropped while holding the scheduler lock, releasing");
        let locks = self.locks.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        runtime.spawn(async move {
            let outcome = locks.release(&key, &token).await;
            log_release(&key, outcome);
        });
    }
}

fn log_release(key: &str, outcome: LockResult<bool>) {
    match outcome {
        Ok(true) => tracing::debug!(lock_key = key, "Scheduler lock released"),
        Ok(false) => tracing::warn!(lock_key = key, "Scheduler lock had expired or changed owner"),
        Err(e) => tracing::error!(lock_key = key, error = %e, "Failed to release scheduler lock"),
    }
}

/// Log a one-line summary of a tick
pub fn log_tick(report: &TickReport) {
    match report {
        TickReport::LockContended => tracing::info!("Tick skipped: lock contended"),
        TickReport::Ran { runs } => {
            let completed = runs
                .iter()
                .filter(|run| matches!(run, CampaignRun::Crawled(r) if r.is_completed()))
                .count();
            let new_leads: usize = runs
                .iter()
                .filter_map(|run| match run {
                    CampaignRun::Crawled(r) => Some(r.new_leads),
                    _ => None,
                })
                .sum();
            tracing::info!(
                campaigns = runs.len(),
                completed,
                failed = runs.len() - completed,
                new_leads,
                "Tick finished"
            );
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
