//! Events, demos and rooms

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DemoId, EventId, RoomId, UserId};

/// A hosted networking event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub host_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub max_attendees: i32,
    pub current_attendees: i32,
}

impl Event {
    pub fn is_full(&self) -> bool {
        self.current_attendees >= self.max_attendees
    }
}

/// A product demo session, optionally recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demo {
    pub id: DemoId,
    pub host_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub max_participants: i32,
    pub current_participants: i32,
    pub recording_url: Option<String>,
    pub recording_visible_until: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub featured_until: Option<DateTime<Utc>>,
}

impl Demo {
    pub fn is_full(&self) -> bool {
        self.current_participants >= self.max_participants
    }

    /// Whether the recording can be watched at `now`
    pub fn recording_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.recording_url.is_some() && self.recording_visible_until.is_some_and(|t| t > now)
    }
}

/// A live networking room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub host_id: UserId,
    pub name: String,
    pub max_participants: i32,
    pub current_participants: i32,
}

impl Room {
    pub fn is_full(&self) -> bool {
        self.current_participants >= self.max_participants
    }
}
