//! Sync service
//!
//! Postgres is authoritative. A row flagged `needs_firebase_sync` is pushed
//! to `users/{firebase_uid}` and the flag is cleared only if `sync_version`
//! is unchanged since the read, so a write that lands mid-push is never lost.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use inrooms_db::{CreateUser, Repositories, UserRow};
use inrooms_types::{Plan, Role, SubscriptionStatus, UserId, TRIAL_DAYS, TRIAL_EVENTS_QUOTA};

use crate::document::UserDocument;
use crate::retry::{with_retry, RetryConfig};
use crate::store::DocumentStore;
use crate::SyncError;

/// Sync settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub collection: String,
    /// Users per `sync_pending` pass
    pub batch_size: i64,
    /// Failed attempts before a user is dead-lettered
    pub max_attempts: i32,
    /// Sweeper interval
    pub interval: Duration,
    /// In-call retries around a single document write
    pub write_retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            collection: "users".to_string(),
            batch_size: 50,
            max_attempts: 10,
            interval: Duration::from_secs(30),
            write_retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Document written and flag cleared
    Synced,
    /// Document written but the row changed meanwhile; flag stays set
    Superseded,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Superseded => "superseded",
        }
    }
}

/// Result of one user sync
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub user_id: UserId,
    pub firebase_uid: String,
    pub sync_version: i64,
    pub outcome: SyncOutcome,
    pub document: UserDocument,
}

/// Result of a `sync_pending` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub synced: usize,
    pub superseded: usize,
    pub failed: usize,
}

impl BatchReport {
    /// Every attempt in a non-empty pass failed
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted
    }
}

/// Identity handed over by the client after Firebase sign-in
#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    pub firebase_uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Result of `upsert_from_identity`
#[derive(Debug, Clone)]
pub struct LinkedUser {
    pub user: UserRow,
    pub created: bool,
    pub sync: SyncReport,
}

/// Sync service
#[derive(Clone)]
pub struct SyncService {
    repos: Repositories,
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
    locks: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl SyncService {
    pub fn new(repos: Repositories, store: Arc<dyn DocumentStore>, config: SyncConfig) -> Self {
        Self {
            repos,
            store,
            config,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Push one user's subscription to the document store.
    #[instrument(skip(self))]
    pub async fn sync_user(&self, user_id: UserId) -> Result<SyncReport, SyncError> {
        let start = Instant::now();

        let lock = self.lock_for(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.sync_locked(user_id).await
        };
        drop(lock);
        self.locks
            .remove_if(&user_id, |_, l| Arc::strong_count(l) == 1);

        let label = match &result {
            Ok(report) => report.outcome.as_str(),
            Err(e) => e.outcome_label(),
        };
        metrics::counter!("inrooms_sync_total", "result" => label).increment(1);
        metrics::histogram!(
            "inrooms_operation_duration_seconds",
            "operation" => "sync_user",
            "result" => label
        )
        .record(start.elapsed().as_secs_f64());

        result
    }

    fn lock_for(&self, user_id: UserId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(user_id).or_default().value())
    }

    async fn sync_locked(&self, user_id: UserId) -> Result<SyncReport, SyncError> {
        let row = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SyncError::UserNotFound)?;

        let document = UserDocument::from_row(&row, Utc::now())?;
        let fields = document.fields();

        let written = with_retry(&self.config.write_retry, || {
            self.store.merge_document(
                &self.config.collection,
                &document.firebase_uid,
                &fields,
                UserDocument::FIELD_MASK,
            )
        })
        .await;

        if let Err(e) = written {
            warn!(error = %e, "Document write failed");
            self.repos
                .users
                .record_sync_failure(user_id, &e.to_string())
                .await?;
            return Err(e);
        }

        let outcome = if self
            .repos
            .users
            .complete_sync(user_id, row.sync_version)
            .await?
        {
            SyncOutcome::Synced
        } else {
            debug!(version = row.sync_version, "Row changed during sync");
            SyncOutcome::Superseded
        };

        Ok(SyncReport {
            user_id,
            firebase_uid: document.firebase_uid.clone(),
            sync_version: row.sync_version,
            outcome,
            document,
        })
    }

    /// Sync every flagged user below the dead-letter threshold, up to one batch.
    #[instrument(skip(self))]
    pub async fn sync_pending(&self) -> Result<BatchReport, SyncError> {
        let pending = self
            .repos
            .users
            .find_pending_sync(self.config.batch_size, self.config.max_attempts)
            .await?;

        let mut report = BatchReport {
            attempted: pending.len(),
            ..BatchReport::default()
        };

        for row in pending {
            match self.sync_user(row.user_id()).await {
                Ok(r) if r.outcome == SyncOutcome::Synced => report.synced += 1,
                Ok(_) => report.superseded += 1,
                Err(e) => {
                    warn!(user_id = %row.id, error = %e, "User sync failed");
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                synced = report.synced,
                superseded = report.superseded,
                failed = report.failed,
                "Sync pass complete"
            );
        }
        Ok(report)
    }

    /// Find or create the authoritative user for a Firebase identity, then
    /// sync them. New users start on the trial.
    #[instrument(skip(self, identity), fields(firebase_uid = %identity.firebase_uid))]
    pub async fn upsert_from_identity(
        &self,
        identity: FirebaseIdentity,
    ) -> Result<LinkedUser, SyncError> {
        validate_identity(&identity)?;
        let users = &self.repos.users;

        let (user, created) = if let Some(user) =
            users.find_by_firebase_uid(&identity.firebase_uid).await?
        {
            (user, false)
        } else if let Some(existing) = users.find_by_email(&identity.email).await? {
            if existing.firebase_uid.is_some() {
                warn!(user_id = %existing.id, "Email already linked to another Firebase uid");
                return Err(SyncError::IdentityConflict);
            }
            let linked = users
                .link_firebase_uid(
                    existing.user_id(),
                    &identity.firebase_uid,
                    identity.display_name.as_deref(),
                )
                .await?
                // another sign-in linked the row first
                .ok_or(SyncError::IdentityConflict)?;
            info!(user_id = %linked.id, "Linked Firebase identity to existing user");
            (linked, false)
        } else {
            let user = users
                .create(CreateUser {
                    id: UserId::new(),
                    email: identity.email,
                    firebase_uid: Some(identity.firebase_uid),
                    display_name: identity.display_name,
                    role: Role::User,
                    status: SubscriptionStatus::Trial,
                    plan: Plan::Starter,
                    events_quota: TRIAL_EVENTS_QUOTA,
                    trial_ends_at: Some(Utc::now() + ChronoDuration::days(TRIAL_DAYS)),
                })
                .await?;
            info!(user_id = %user.id, "Created trial user");
            (user, true)
        };

        let sync = self.sync_user(user.user_id()).await?;
        Ok(LinkedUser {
            user,
            created,
            sync,
        })
    }
}

fn validate_identity(identity: &FirebaseIdentity) -> Result<(), SyncError> {
    let uid = identity.firebase_uid.trim();
    if uid.is_empty() || uid.len() > 128 || uid.contains('/') {
        return Err(SyncError::InvalidInput("invalid firebase_uid".into()));
    }
    let email = identity.email.trim();
    if email.len() > 254 || !email.contains('@') {
        return Err(SyncError::InvalidInput("invalid email".into()));
    }
    Ok(())
}
