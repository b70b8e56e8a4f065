//! PostgreSQL store tests (require a live database)

use std::sync::Arc;

use prospector::campaign::{CampaignStateMachine, Transition};
use prospector::models::{CampaignStatus, Lead};
use prospector::storage::{CampaignStore, DedupStore, LeadStore, PgDedupStore, PgStore};
use serial_test::serial;
use uuid::Uuid;

use super::fixtures::{pg_pool, unique_campaign, unique_identifier};

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn test_pickup_is_exclusive() {
    let store = Arc::new(PgStore::new(pg_pool().await));
    let campaign = unique_campaign("pickup");
    store.insert_campaign(&campaign).await.unwrap();
    let id = campaign.id;

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.transition(id, &Transition::pickup()).await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.transition(id, &Transition::pickup()).await })
    };

    let claimed = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
    assert_eq!(claimed.iter().filter(|c| c.is_some()).count(), 1);

    let stored = store.get_campaign(id).await.unwrap().unwrap();
    assert!(stored.processing);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn test_complete_appends_lead_ids() {
    let store = Arc::new(PgStore::new(pg_pool().await));
    let state = CampaignStateMachine::new(store.clone());

    let campaign = unique_campaign("complete");
    store.insert_campaign(&campaign).await.unwrap();

    let first_run = vec![Uuid::new_v4(), Uuid::new_v4()];
    state.pickup(campaign.id).await.unwrap().unwrap();
    state
        .complete(campaign.id, first_run.clone(), Some(120))
        .await
        .unwrap()
        .unwrap();

    // Completed campaigns are not picked up again
    assert!(state.pickup(campaign.id).await.unwrap().is_none());

    let updated = store.get_campaign(campaign.id).await.unwrap().unwrap();
    assert_eq!(updated.status, CampaignStatus::Completed);
    assert!(updated.is_searched);
    assert!(!updated.processing);
    assert_eq!(updated.run_count, 1);
    assert_eq!(updated.lead_ids, first_run);
    assert_eq!(updated.total_results, Some(120));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn test_fail_keeps_run_count_and_allows_retry() {
    let store = Arc::new(PgStore::new(pg_pool().await));
    let state = CampaignStateMachine::new(store.clone());

    let campaign = unique_campaign("fail");
    store.insert_campaign(&campaign).await.unwrap();

    state.pickup(campaign.id).await.unwrap().unwrap();
    let failed = state.fail(campaign.id).await.unwrap().unwrap();
    assert_eq!(failed.status, CampaignStatus::Failed);
    assert!(!failed.processing);
    assert_eq!(failed.run_count, 0);
    assert!(failed.last_run.is_some());

    // Failing twice is a no-op, and the campaign is eligible again
    assert!(state.fail(campaign.id).await.unwrap().is_none());
    assert!(state.pickup(campaign.id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn test_transition_on_missing_campaign_is_error() {
    let store = PgStore::new(pg_pool().await);
    let err = store
        .transition(Uuid::new_v4(), &Transition::fail())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        prospector::storage::StorageError::CampaignNotFound(_)
    ));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn test_duplicate_lead_is_reported() {
    let store = PgStore::new(pg_pool().await);
    let campaign = unique_campaign("leads");
    store.insert_campaign(&campaign).await.unwrap();

    let external_id = unique_identifier("lead");
    store
        .create_lead(&Lead::new(external_id.as_str(), campaign.id))
        .await
        .unwrap();
    let err = store
        .create_lead(&Lead::new(external_id.as_str(), campaign.id))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    let leads = store.leads_for_campaign(campaign.id).await.unwrap();
    assert_eq!(leads.len(), 1);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn test_concurrent_dedup_inserts_record_once() {
    let pool = pg_pool().await;
    let dedup = Arc::new(PgDedupStore::new(pool));
    let external_id = unique_identifier("dedup");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dedup = dedup.clone();
        let external_id = external_id.clone();
        handles.push(tokio::spawn(async move {
            dedup.insert_if_absent(&external_id, Uuid::new_v4()).await
        }));
    }

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1);
    assert!(dedup.exists(&external_id).await.unwrap());
    assert!(dedup.get(&external_id).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server"]
#[serial]
async fn test_dedup_release_only_by_owner() {
    let dedup = PgDedupStore::new(pg_pool().await);
    let external_id = unique_identifier("release");
    let owner = Uuid::new_v4();

    assert!(dedup.insert_if_absent(&external_id, owner).await.unwrap());
    assert!(!dedup.release(&external_id, Uuid::new_v4()).await.unwrap());
    assert!(dedup.exists(&external_id).await.unwrap());

    assert!(dedup.release(&external_id, owner).await.unwrap());
    assert!(!dedup.exists(&external_id).await.unwrap());
}
