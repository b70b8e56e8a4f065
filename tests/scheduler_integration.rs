//! Integration tests for the scheduler tick
//!
//! These tests verify the complete workflow of:
//! - Cluster lock acquisition, contention and release
//! - Eligible campaign selection and sequential processing
//! - Containment of failed and panicking campaigns
//! - The periodic loop and its shutdown signal

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use prospector::campaign::Transition;
use prospector::config::{CrawlConfig, SchedulerConfig};
use prospector::crawler::CrawlOutcome;
use prospector::lock::{InMemoryLockManager, LockManager};
use prospector::models::{Campaign, CampaignStatus};
use prospector::scheduler::{CampaignRun, Scheduler, SchedulerError, TickReport};
use prospector::storage::{
    CampaignStore, DedupStore, InMemoryStore, LeadStore, StorageResult, Stores,
};
use tokio::sync::watch;
use uuid::Uuid;

use common::{reload, test_crawl_config, test_engine, FakeBrowser, FakePage, FakeProvider};

const LOCK_KEY: &str = "scheduler:run";

struct Harness {
    store: Arc<InMemoryStore>,
    locks: Arc<InMemoryLockManager>,
    scheduler: Scheduler,
}

fn harness(crawl: CrawlConfig, batch_size: usize) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let locks = Arc::new(InMemoryLockManager::new());
    let engine = test_engine(&Stores::in_memory(store.clone()), crawl);
    let config = SchedulerConfig {
        batch_size,
        lock_key: LOCK_KEY.to_string(),
        lock_ttl_secs: 60,
        interval_secs: 3600,
    };
    let scheduler = Scheduler::new(locks.clone(), engine, config).unwrap();
    Harness {
        store,
        locks,
        scheduler,
    }
}

/// Insert campaigns with strictly increasing creation times
async fn seed(store: &InMemoryStore, campaigns: Vec<Campaign>) -> Vec<Campaign> {
    let base = Utc::now() - Duration::hours(1);
    let mut seeded = Vec::new();
    for (i, mut campaign) in campaigns.into_iter().enumerate() {
        campaign.created_at = base + Duration::seconds(i as i64);
        store.insert_campaign(&campaign).await.unwrap();
        seeded.push(campaign);
    }
    seeded
}

/// Campaign store whose eligibility query panics or never returns
struct BrokenEligibility {
    inner: Arc<InMemoryStore>,
    hang: bool,
}

#[async_trait]
impl CampaignStore for BrokenEligibility {
    async fn insert_campaign(&self, campaign: &Campaign) -> StorageResult<()> {
        self.inner.insert_campaign(campaign).await
    }

    async fn get_campaign(&self, id: Uuid) -> StorageResult<Option<Campaign>> {
        self.inner.get_campaign(id).await
    }

    async fn find_eligible(&self, _limit: usize) -> StorageResult<Vec<Campaign>> {
        if self.hang {
            return std::future::pending().await;
        }
        panic!("eligibility query exploded");
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: &Transition,
    ) -> StorageResult<Option<Campaign>> {
        self.inner.transition(id, transition).await
    }
}

fn broken_scheduler(hang: bool) -> (Arc<InMemoryLockManager>, Scheduler) {
    let store = Arc::new(InMemoryStore::new());
    let stores = Stores {
        campaigns: Arc::new(BrokenEligibility {
            inner: store.clone(),
            hang,
        }),
        leads: store.clone(),
        dedup: store,
    };
    let locks = Arc::new(InMemoryLockManager::new());
    let config = SchedulerConfig {
        batch_size: 5,
        lock_key: LOCK_KEY.to_string(),
        lock_ttl_secs: 7200,
        interval_secs: 3600,
    };
    let engine = test_engine(&stores, test_crawl_config());
    let scheduler = Scheduler::new(locks.clone(), engine, config).unwrap();
    (locks, scheduler)
}

fn crawled(run: &CampaignRun) -> &prospector::crawler::CrawlReport {
    match run {
        CampaignRun::Crawled(report) => report,
        other => panic!("expected a crawl, got {other:?}"),
    }
}

// ============================================================================
// Lock Integration Tests
// ============================================================================

#[tokio::test]
async fn test_contended_lock_skips_tick() {
    let h = harness(test_crawl_config(), 5);
    let seeded = seed(&h.store, vec![Campaign::new("Waiting", "engineer")]).await;

    assert!(h.locks.acquire(LOCK_KEY, "other-worker", 60).await.unwrap());

    let mut browser = FakeBrowser::new(vec![FakePage::profiles(&["alice-a"])]);
    let report = h.scheduler.run_tick(&mut browser).await.unwrap();

    assert!(matches!(report, TickReport::LockContended));
    assert!(browser.navigations.is_empty());

    let untouched = reload(&h.store, seeded[0].id).await;
    assert_eq!(untouched.status, CampaignStatus::Created);
    assert!(!untouched.processing);

    // The other worker still owns the lock
    assert_eq!(h.locks.holder(LOCK_KEY).as_deref(), Some("other-worker"));
}

#[tokio::test]
async fn test_lock_released_after_tick() {
    let h = harness(test_crawl_config(), 5);
    seed(&h.store, vec![Campaign::new("Once", "engineer")]).await;

    let mut browser = FakeBrowser::new(vec![FakePage::profiles(&["alice-a"])]);
    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    assert_eq!(report.runs().len(), 1);
    assert!(h.locks.holder(LOCK_KEY).is_none());

    // A second tick can take the lock again and finds nothing to do
    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    assert!(matches!(report, TickReport::Ran { ref runs } if runs.is_empty()));
    assert!(h.locks.holder(LOCK_KEY).is_none());
}

#[tokio::test]
async fn test_lock_released_when_batch_panics() {
    let (locks, scheduler) = broken_scheduler(false);

    let mut browser = FakeBrowser::new(vec![]);
    let err = scheduler.run_tick(&mut browser).await.unwrap_err();

    assert!(matches!(err, SchedulerError::BatchPanicked(ref m) if m.contains("exploded")));
    assert!(locks.holder(LOCK_KEY).is_none());
}

#[tokio::test]
async fn test_lock_released_when_tick_is_dropped() {
    let (locks, scheduler) = broken_scheduler(true);

    let mut browser = FakeBrowser::new(vec![]);
    let tick = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        scheduler.run_tick(&mut browser),
    )
    .await;
    assert!(tick.is_err());

    // The release runs on a spawned task; give it a chance to finish
    for _ in 0..10 {
        if locks.holder(LOCK_KEY).is_none() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(locks.holder(LOCK_KEY).is_none());
}

// ============================================================================
// Batch Processing Tests
// ============================================================================

#[tokio::test]
async fn test_page_cap_on_first_campaign_does_not_stop_batch() {
    let crawl = CrawlConfig {
        page_cap: 1,
        ..test_crawl_config()
    };
    let h = harness(crawl, 5);
    let seeded = seed(
        &h.store,
        vec![
            Campaign::new("Deep", "many pages"),
            Campaign::new("Second", "second query"),
            Campaign::new("Third", "third query"),
        ],
    )
    .await;

    let mut browser = FakeBrowser::new(vec![FakePage::profiles(&["x-1"])])
        .with_script(
            "many pages",
            vec![
                FakePage::profiles(&["deep-1"]).with_next(),
                FakePage::profiles(&["deep-2"]),
            ],
        )
        .with_script("second query", vec![FakePage::profiles(&["second-1"])])
        .with_script("third query", vec![FakePage::profiles(&["third-1"])]);

    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    let runs = report.runs();
    assert_eq!(runs.len(), 3);

    // Processed in creation order
    let order: Vec<_> = runs.iter().map(|r| r.campaign_id()).collect();
    let expected: Vec<_> = seeded.iter().map(|c| c.id).collect();
    assert_eq!(order, expected);

    for run in runs {
        assert_eq!(crawled(run).outcome, CrawlOutcome::Completed);
    }
    assert_eq!(
        crawled(&runs[0]).stop_reason,
        prospector::crawler::StopReason::PageCap
    );

    for campaign in &seeded {
        let updated = reload(&h.store, campaign.id).await;
        assert_eq!(updated.status, CampaignStatus::Completed);
        assert!(!updated.processing);
        assert_eq!(updated.run_count, 1);
        assert_eq!(updated.lead_ids.len(), 1);
    }
}

#[tokio::test]
async fn test_batch_size_bounds_selection() {
    let h = harness(test_crawl_config(), 2);
    let seeded = seed(
        &h.store,
        vec![
            Campaign::new("First", "q1"),
            Campaign::new("Second", "q2"),
            Campaign::new("Third", "q3"),
        ],
    )
    .await;

    let mut browser = FakeBrowser::new(vec![FakePage::default()]);
    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    assert_eq!(report.runs().len(), 2);

    let third = reload(&h.store, seeded[2].id).await;
    assert_eq!(third.status, CampaignStatus::Created);
    assert_eq!(third.run_count, 0);
}

#[tokio::test]
async fn test_ineligible_campaigns_are_not_selected() {
    let h = harness(test_crawl_config(), 5);
    let seeded = seed(
        &h.store,
        vec![
            Campaign::new("Paused", "q1").with_scheduled(false),
            Campaign::new("Cancelled", "q2").with_status(CampaignStatus::Cancelled),
            Campaign::new("Done", "q3").with_status(CampaignStatus::Completed),
            Campaign::new("Retry", "q4").with_status(CampaignStatus::Failed),
        ],
    )
    .await;

    let mut browser = FakeBrowser::new(vec![FakePage::default()]);
    let report = h.scheduler.run_tick(&mut browser).await.unwrap();

    let ids: Vec<_> = report.runs().iter().map(|r| r.campaign_id()).collect();
    assert_eq!(ids, vec![seeded[3].id]);

    let retried = reload(&h.store, seeded[3].id).await;
    assert_eq!(retried.status, CampaignStatus::Completed);
}

#[tokio::test]
async fn test_failed_campaign_does_not_stop_batch() {
    let h = harness(test_crawl_config(), 5);
    let seeded = seed(
        &h.store,
        vec![
            Campaign::new("Broken", "broken"),
            Campaign::new("Healthy", "healthy"),
        ],
    )
    .await;

    let mut browser = FakeBrowser::new(vec![FakePage::default()])
        .with_script("broken", vec![FakePage::failing()])
        .with_script("healthy", vec![FakePage::profiles(&["olga-o"])]);

    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    let runs = report.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(crawled(&runs[0]).outcome, CrawlOutcome::Failed);
    assert_eq!(crawled(&runs[1]).outcome, CrawlOutcome::Completed);

    let broken = reload(&h.store, seeded[0].id).await;
    assert_eq!(broken.status, CampaignStatus::Failed);
    assert!(!broken.processing);

    // Failed campaigns are picked up again on the next tick
    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    let ids: Vec<_> = report.runs().iter().map(|r| r.campaign_id()).collect();
    assert_eq!(ids, vec![seeded[0].id]);
}

#[tokio::test]
async fn test_dedup_is_global_across_campaigns() {
    let h = harness(test_crawl_config(), 5);
    let seeded = seed(
        &h.store,
        vec![
            Campaign::new("Early", "engineer"),
            Campaign::new("Late", "engineer"),
        ],
    )
    .await;

    let mut browser = FakeBrowser::new(vec![FakePage::profiles(&["alice-a", "bob-b"])]);
    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    let runs = report.runs();

    assert_eq!(crawled(&runs[0]).new_leads, 2);
    assert_eq!(crawled(&runs[1]).new_leads, 0);
    assert_eq!(crawled(&runs[1]).duplicates_skipped, 2);

    assert_eq!(h.store.lead_count(), 2);
    assert_eq!(h.store.dedup_count(), 2);

    // The first discoverer owns the record
    let record = h.store.get("alice-a").await.unwrap().unwrap();
    assert_eq!(record.campaign_id, seeded[0].id);
    assert!(h
        .store
        .leads_for_campaign(seeded[1].id)
        .await
        .unwrap()
        .is_empty());

    let late = reload(&h.store, seeded[1].id).await;
    assert_eq!(late.status, CampaignStatus::Completed);
    assert!(late.lead_ids.is_empty());
}

#[tokio::test]
async fn test_panicking_crawl_is_contained() {
    let h = harness(test_crawl_config(), 5);
    let seeded = seed(
        &h.store,
        vec![
            Campaign::new("Crashes", "crash"),
            Campaign::new("Survives", "survive"),
        ],
    )
    .await;

    let mut browser = FakeBrowser::new(vec![FakePage::profiles(&["pat-p"])]).panic_on("crash");

    let report = h.scheduler.run_tick(&mut browser).await.unwrap();
    let runs = report.runs();
    assert_eq!(runs.len(), 2);
    assert!(
        matches!(&runs[0], CampaignRun::Panicked { message, .. } if message.contains("renderer crashed"))
    );
    assert_eq!(crawled(&runs[1]).outcome, CrawlOutcome::Completed);

    let crashed = reload(&h.store, seeded[0].id).await;
    assert_eq!(crashed.status, CampaignStatus::Failed);
    assert!(!crashed.processing);

    assert!(h.locks.holder(LOCK_KEY).is_none());
}

// ============================================================================
// Periodic Loop Tests
// ============================================================================

#[tokio::test]
async fn test_periodic_loop_stops_on_shutdown() {
    let h = harness(test_crawl_config(), 5);
    seed(&h.store, vec![Campaign::new("Looped", "engineer")]).await;

    let provider = FakeProvider {
        browser: FakeBrowser::new(vec![FakePage::profiles(&["quinn-q"])]),
        unavailable: false,
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticks = AtomicUsize::new(0);

    h.scheduler
        .run_periodic(&provider, shutdown_rx, |report| {
            ticks.fetch_add(1, Ordering::SeqCst);
            assert_eq!(report.runs().len(), 1);
            shutdown_tx.send(true).unwrap();
        })
        .await;

    assert_eq!(ticks.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.lead_count(), 1);
}

#[tokio::test]
async fn test_periodic_loop_skips_tick_without_browser() {
    let h = harness(test_crawl_config(), 5);
    let seeded = seed(&h.store, vec![Campaign::new("Stranded", "engineer")]).await;

    let provider = FakeProvider {
        browser: FakeBrowser::new(vec![FakePage::default()]),
        unavailable: true,
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    drop(shutdown_tx);
    let ticks = AtomicUsize::new(0);

    h.scheduler
        .run_periodic(&provider, shutdown_rx, |_| {
            ticks.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    assert_eq!(ticks.load(Ordering::SeqCst), 0);
    assert!(h.locks.holder(LOCK_KEY).is_none());
    assert_eq!(
        reload(&h.store, seeded[0].id).await.status,
        CampaignStatus::Created
    );
}
