//! Sync service against the in-memory store and document store

use std::sync::Arc;
use std::time::Duration;

use inrooms_db::memory::MemoryStore;
use inrooms_db::{Repositories, SubscriptionChange};
use inrooms_sync::{
    FieldValue, Fields, FirebaseIdentity, MemoryDocumentStore, RetryConfig, SyncConfig,
    SyncError, SyncOutcome, SyncService,
};
use inrooms_types::{Plan, SubscriptionStatus, UserId};

struct Harness {
    store: MemoryStore,
    repos: Repositories,
    docs: MemoryDocumentStore,
    sync: SyncService,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let repos = store.repositories();
    let docs = MemoryDocumentStore::new();
    let config = SyncConfig {
        max_attempts: 3,
        write_retry: RetryConfig::new().with_max_attempts(0),
        interval: Duration::from_millis(10),
        ..SyncConfig::default()
    };
    let sync = SyncService::new(repos.clone(), Arc::new(docs.clone()), config);
    Harness {
        store,
        repos,
        docs,
        sync,
    }
}

fn active_user(h: &Harness) -> (UserId, String) {
    let mut row = MemoryStore::test_user(SubscriptionStatus::Active, Plan::Professional, 2, 15);
    row.needs_firebase_sync = true;
    let uid = row.firebase_uid.clone().unwrap();
    let id = row.user_id();
    h.store.insert_user(row);
    (id, uid)
}

#[tokio::test]
async fn test_sync_writes_active_status() {
    let h = harness();
    let (id, uid) = active_user(&h);

    let report = h.sync.sync_user(id).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Synced);

    assert_eq!(
        h.docs.subscription_field(&uid, "status"),
        Some(FieldValue::string("active"))
    );
    assert_eq!(
        h.docs.subscription_field(&uid, "eventsUsed"),
        Some(FieldValue::IntegerValue(2))
    );

    let row = h.store.user(id).unwrap();
    assert!(!row.needs_firebase_sync);
    assert!(row.last_synced_at.is_some());
}

#[tokio::test]
async fn test_sync_preserves_client_fields() {
    let h = harness();
    let (id, uid) = active_user(&h);
    h.docs.insert(
        "users",
        &uid,
        Fields::from([("onboarding".to_string(), FieldValue::string("done"))]),
    );

    h.sync.sync_user(id).await.unwrap();

    let doc = h.docs.document("users", &uid).unwrap();
    assert_eq!(doc["onboarding"], FieldValue::string("done"));
    assert!(doc.contains_key("subscription"));
}

#[tokio::test]
async fn test_unlinked_user_is_not_synced() {
    let h = harness();
    let mut row = MemoryStore::trial_user();
    row.firebase_uid = None;
    row.needs_firebase_sync = true;
    let id = row.user_id();
    h.store.insert_user(row);

    let err = h.sync.sync_user(id).await.unwrap_err();
    assert!(matches!(err, SyncError::NotLinked));

    // The sweeper leaves them alone until an identity is linked
    let pass = h.sync.sync_pending().await.unwrap();
    assert_eq!(pass.attempted, 0);
}

#[tokio::test]
async fn test_failure_is_recorded_and_dead_lettered() {
    let h = harness();
    let (id, _) = active_user(&h);
    h.docs.fail_next(3);

    for _ in 0..3 {
        let err = h.sync.sync_user(id).await.unwrap_err();
        assert!(err.is_retryable());
    }

    let row = h.store.user(id).unwrap();
    assert!(row.needs_firebase_sync);
    assert_eq!(row.sync_attempts, 3);
    assert!(row.last_sync_error.is_some());

    // max_attempts = 3: no longer picked up by the sweeper
    assert_eq!(h.sync.sync_pending().await.unwrap().attempted, 0);

    // A new change re-arms the row
    h.repos
        .users
        .apply_subscription_change(id, SubscriptionChange::reset_usage())
        .await
        .unwrap();
    let pass = h.sync.sync_pending().await.unwrap();
    assert_eq!(pass.synced, 1);
}

#[tokio::test]
async fn test_in_call_retry_recovers_transient_failure() {
    let store = MemoryStore::new();
    let docs = MemoryDocumentStore::new();
    let sync = SyncService::new(
        store.repositories(),
        Arc::new(docs.clone()),
        SyncConfig {
            write_retry: RetryConfig::new()
                .with_max_attempts(2)
                .with_base_delay(Duration::from_millis(1)),
            ..SyncConfig::default()
        },
    );
    let row = MemoryStore::trial_user();
    let id = row.user_id();
    store.insert_user(row);
    docs.fail_next(1);

    let report = sync.sync_user(id).await.unwrap();
    assert_eq!(report.outcome, SyncOutcome::Synced);
    assert_eq!(store.user(id).unwrap().sync_attempts, 0);
}

#[tokio::test]
async fn test_sync_pending_drains_dirty_rows() {
    let h = harness();
    for _ in 0..4 {
        active_user(&h);
    }
    let clean = MemoryStore::trial_user();
    h.store.insert_user(clean);

    let pass = h.sync.sync_pending().await.unwrap();
    assert_eq!(pass.attempted, 4);
    assert_eq!(pass.synced, 4);
    assert_eq!(h.docs.writes(), 4);

    assert_eq!(h.sync.sync_pending().await.unwrap().attempted, 0);
}

#[tokio::test]
async fn test_concurrent_syncs_leave_row_clean() {
    let h = Arc::new(harness());
    let (id, _) = active_user(&h);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.sync.sync_user(id).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert!(!h.store.user(id).unwrap().needs_firebase_sync);
}

#[tokio::test]
async fn test_upsert_creates_trial_user() {
    let h = harness();

    let linked = h
        .sync
        .upsert_from_identity(FirebaseIdentity {
            firebase_uid: "fb-new".into(),
            email: "new@example.com".into(),
            display_name: Some("New".into()),
        })
        .await
        .unwrap();

    assert!(linked.created);
    assert_eq!(linked.user.subscription_status, "trial");
    assert_eq!(linked.user.events_quota, 3);
    assert_eq!(
        h.docs.subscription_field("fb-new", "status"),
        Some(FieldValue::string("trial"))
    );

    // Second sign-in finds the same user
    let again = h
        .sync
        .upsert_from_identity(FirebaseIdentity {
            firebase_uid: "fb-new".into(),
            email: "new@example.com".into(),
            display_name: None,
        })
        .await
        .unwrap();
    assert!(!again.created);
    assert_eq!(again.user.id, linked.user.id);
}

#[tokio::test]
async fn test_upsert_links_existing_email() {
    let h = harness();
    let mut row = MemoryStore::test_user(SubscriptionStatus::Active, Plan::Starter, 0, 5);
    row.firebase_uid = None;
    row.email = "owner@example.com".into();
    let id = row.user_id();
    h.store.insert_user(row);

    let linked = h
        .sync
        .upsert_from_identity(FirebaseIdentity {
            firebase_uid: "fb-owner".into(),
            email: "owner@example.com".into(),
            display_name: None,
        })
        .await
        .unwrap();

    assert!(!linked.created);
    assert_eq!(linked.user.user_id(), id);
    assert_eq!(
        h.store.user(id).unwrap().firebase_uid.as_deref(),
        Some("fb-owner")
    );
    assert_eq!(
        h.docs.subscription_field("fb-owner", "status"),
        Some(FieldValue::string("active"))
    );
}

#[tokio::test]
async fn test_upsert_refuses_email_linked_elsewhere() {
    let h = harness();
    let (id, uid) = active_user(&h);
    let email = h.store.user(id).unwrap().email;

    let err = h
        .sync
        .upsert_from_identity(FirebaseIdentity {
            firebase_uid: "fb-intruder".into(),
            email,
            display_name: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::IdentityConflict));
    assert!(!err.is_retryable());
    assert_eq!(h.store.user(id).unwrap().firebase_uid, Some(uid));
    assert!(h.docs.subscription_field("fb-intruder", "status").is_none());
}
