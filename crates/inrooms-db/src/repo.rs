//! Repository traits
//!
//! Define async repository interfaces for database operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use inrooms_types::{DemoId, EventId, Plan, Role, RoomId, SubscriptionStatus, UserId};

use crate::error::DbResult;
use crate::models::*;

/// User repository trait
///
/// Every method that changes a field mirrored to Firestore flags the row for
/// sync and bumps `sync_version` in the same statement.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<UserRow>>;

    /// Find a user by Firebase UID
    async fn find_by_firebase_uid(&self, uid: &str) -> DbResult<Option<UserRow>>;

    /// Find a user by email
    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>>;

    /// Find a user by Stripe customer ID
    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> DbResult<Option<UserRow>>;

    /// Create a new user
    async fn create(&self, user: CreateUser) -> DbResult<UserRow>;

    /// Attach a Firebase identity to a user that has none yet (or already
    /// has this one). `None` if the user is missing or linked elsewhere.
    async fn link_firebase_uid(
        &self,
        id: UserId,
        uid: &str,
        display_name: Option<&str>,
    ) -> DbResult<Option<UserRow>>;

    /// Update user's Stripe customer ID
    async fn set_stripe_customer_id(&self, id: UserId, customer_id: &str) -> DbResult<()>;

    /// Apply a subscription change coming from billing.
    ///
    /// Returns `None` when the user does not exist or when the change is
    /// older than the last Stripe event already applied to the row.
    async fn apply_subscription_change(
        &self,
        id: UserId,
        change: SubscriptionChange,
    ) -> DbResult<Option<UserRow>>;

    /// Linked users flagged for sync that have not been dead-lettered,
    /// oldest first
    async fn find_pending_sync(&self, limit: i64, max_attempts: i32) -> DbResult<Vec<UserRow>>;

    /// Clear the sync flag if the row is still at `version`.
    ///
    /// Returns false when the row changed after it was read.
    async fn complete_sync(&self, id: UserId, version: i64) -> DbResult<bool>;

    /// Count a failed sync attempt
    async fn record_sync_failure(&self, id: UserId, error: &str) -> DbResult<()>;
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: UserId,
    pub email: String,
    pub firebase_uid: Option<String>,
    pub display_name: Option<String>,
    pub role: Role,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    pub events_quota: i32,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

/// Partial update of the subscription columns. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<Plan>,
    pub events_quota: Option<i32>,
    /// Start a new billing period: `events_used = 0`
    pub reset_usage: bool,
    pub stripe_subscription_id: Option<String>,
    /// When Stripe emitted the event behind this change. Changes older than
    /// the row's `stripe_event_at` are dropped.
    pub stripe_event_at: Option<DateTime<Utc>>,
}

impl SubscriptionChange {
    pub fn status(status: SubscriptionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn reset_usage() -> Self {
        Self {
            reset_usage: true,
            ..Self::default()
        }
    }

    /// Order this change by the Stripe event that produced it
    pub fn at(mut self, stripe_event_at: DateTime<Utc>) -> Self {
        self.stripe_event_at = Some(stripe_event_at);
        self
    }
}

/// Counter usage after a quota-consuming registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaUsage {
    pub used: i32,
    pub quota: i32,
}

/// Outcome of an atomic registration attempt.
///
/// Every variant other than `Registered` means nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered {
        current: i32,
        max: i32,
        /// `None` for registrations that do not consume quota (rooms)
        quota: Option<QuotaUsage>,
    },
    AlreadyRegistered,
    UserNotFound,
    TargetNotFound,
    SubscriptionInactive,
    QuotaExceeded {
        used: i32,
        quota: i32,
    },
    CapacityReached {
        current: i32,
        max: i32,
    },
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    /// Classify a rejected quota update from the user row re-read after it.
    pub fn quota_denial(user: &UserRow, now: DateTime<Utc>) -> Self {
        if !user.admits_registration(now) {
            Self::SubscriptionInactive
        } else {
            Self::QuotaExceeded {
                used: user.events_used,
                quota: user.events_quota,
            }
        }
    }
}

/// Event repository trait
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: CreateEvent) -> DbResult<EventRow>;

    async fn find_by_id(&self, id: EventId) -> DbResult<Option<EventRow>>;

    /// Atomically register a user: insert the registration, consume one unit
    /// of quota and take one seat, or do nothing.
    async fn register_user(
        &self,
        user_id: UserId,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> DbResult<RegistrationOutcome>;

    async fn is_registered(&self, user_id: UserId, event_id: EventId) -> DbResult<bool>;

    /// Event IDs the user is registered for, most recent first
    async fn registrations_for_user(&self, user_id: UserId) -> DbResult<Vec<EventId>>;
}

/// Create event input
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub id: EventId,
    pub host_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub max_attendees: i32,
}

/// Demo repository trait
#[async_trait]
pub trait DemoRepository: Send + Sync {
    async fn create(&self, demo: CreateDemo) -> DbResult<DemoRow>;

    async fn find_by_id(&self, id: DemoId) -> DbResult<Option<DemoRow>>;

    /// Same atomic shape as event registration
    async fn register_user(
        &self,
        user_id: UserId,
        demo_id: DemoId,
        now: DateTime<Utc>,
    ) -> DbResult<RegistrationOutcome>;

    /// Remove a registration and free its seat. Quota is not refunded.
    ///
    /// Returns false if there was nothing to cancel.
    async fn cancel_registration(&self, user_id: UserId, demo_id: DemoId) -> DbResult<bool>;

    async fn set_recording(
        &self,
        id: DemoId,
        recording_url: &str,
        visible_until: DateTime<Utc>,
    ) -> DbResult<Option<DemoRow>>;

    async fn set_featured(
        &self,
        id: DemoId,
        featured: bool,
        featured_until: Option<DateTime<Utc>>,
    ) -> DbResult<Option<DemoRow>>;
}

/// Create demo input
#[derive(Debug, Clone)]
pub struct CreateDemo {
    pub id: DemoId,
    pub host_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub max_participants: i32,
}

/// Room repository trait
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn create(&self, room: CreateRoom) -> DbResult<RoomRow>;

    async fn find_by_id(&self, id: RoomId) -> DbResult<Option<RoomRow>>;

    /// Take a seat if one is free. Rooms do not consume quota.
    async fn join(&self, user_id: UserId, room_id: RoomId) -> DbResult<RegistrationOutcome>;

    /// Returns false if the user was not in the room
    async fn leave(&self, user_id: UserId, room_id: RoomId) -> DbResult<bool>;
}

/// Create room input
#[derive(Debug, Clone)]
pub struct CreateRoom {
    pub id: RoomId,
    pub host_id: UserId,
    pub name: String,
    pub max_participants: i32,
}

/// Stripe webhook idempotency log
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Record the event id. Returns false if it was already recorded, in
    /// which case the caller must not apply the event.
    async fn claim(&self, event_id: &str, event_type: &str) -> DbResult<bool>;

    /// Forget a claim whose event failed to apply, so a redelivery retries it
    async fn release(&self, event_id: &str) -> DbResult<()>;
}

/// Custom quote repository trait
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn create(&self, quote: CreateQuote) -> DbResult<QuoteRow>;
}

/// Create quote input
#[derive(Debug, Clone)]
pub struct CreateQuote {
    pub name: String,
    pub email: String,
    pub company: String,
    pub team_size: Option<i32>,
    pub message: Option<String>,
}

/// Connectivity probe for readiness checks
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> DbResult<()>;
}

/// All repositories bundled together
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub events: Arc<dyn EventRepository>,
    pub demos: Arc<dyn DemoRepository>,
    pub rooms: Arc<dyn RoomRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
