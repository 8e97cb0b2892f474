//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use inrooms_types::{
    Demo, DemoId, Event, EventId, Plan, QuoteId, Role, Room, RoomId, SubscriptionSnapshot,
    SubscriptionStatus, UserId,
};

use crate::error::DbResult;

/// User row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub firebase_uid: Option<String>,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub subscription_status: String,
    pub subscription_plan: String,
    pub events_quota: i32,
    pub events_used: i32,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub needs_firebase_sync: bool,
    pub sync_version: i64,
    pub sync_attempts: i32,
    pub last_sync_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// `created` of the newest Stripe event applied to this row
    pub stripe_event_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn user_id(&self) -> UserId {
        UserId(self.id)
    }

    /// Typed view of the subscription columns
    pub fn subscription(&self) -> DbResult<SubscriptionSnapshot> {
        Ok(SubscriptionSnapshot {
            user_id: UserId(self.id),
            status: self.subscription_status.parse::<SubscriptionStatus>()?,
            plan: self.subscription_plan.parse::<Plan>()?,
            role: self.role.parse::<Role>()?,
            events_quota: self.events_quota,
            events_used: self.events_used,
            trial_ends_at: self.trial_ends_at,
        })
    }

    /// Mirrors the status predicate of the guarded quota update.
    pub fn admits_registration(&self, now: DateTime<Utc>) -> bool {
        match self.subscription_status.as_str() {
            "active" => true,
            "trial" => self.trial_ends_at.is_none_or(|end| end > now),
            _ => false,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Event row from the database
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub max_attendees: i32,
    pub current_attendees: i32,
    pub created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: EventId(row.id),
            host_id: UserId(row.host_id),
            title: row.title,
            description: row.description,
            starts_at: row.starts_at,
            max_attendees: row.max_attendees,
            current_attendees: row.current_attendees,
        }
    }
}

/// Demo row from the database
#[derive(Debug, Clone, FromRow)]
pub struct DemoRow {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub max_participants: i32,
    pub current_participants: i32,
    pub recording_url: Option<String>,
    pub recording_visible_until: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub featured_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DemoRow> for Demo {
    fn from(row: DemoRow) -> Self {
        Self {
            id: DemoId(row.id),
            host_id: UserId(row.host_id),
            title: row.title,
            description: row.description,
            scheduled_at: row.scheduled_at,
            max_participants: row.max_participants,
            current_participants: row.current_participants,
            recording_url: row.recording_url,
            recording_visible_until: row.recording_visible_until,
            is_featured: row.is_featured,
            featured_until: row.featured_until,
        }
    }
}

/// Room row from the database
#[derive(Debug, Clone, FromRow)]
pub struct RoomRow {
    pub id: Uuid,
    pub host_id: Uuid,
    pub name: String,
    pub max_participants: i32,
    pub current_participants: i32,
    pub created_at: DateTime<Utc>,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Self {
            id: RoomId(row.id),
            host_id: UserId(row.host_id),
            name: row.name,
            max_participants: row.max_participants,
            current_participants: row.current_participants,
        }
    }
}

/// Custom quote request row
#[derive(Debug, Clone, FromRow)]
pub struct QuoteRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company: String,
    pub team_size: Option<i32>,
    pub message: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl QuoteRow {
    pub fn quote_id(&self) -> QuoteId {
        QuoteId(self.id)
    }
}
