//! Admission check and registration outcomes

use serde::{Deserialize, Serialize};

use crate::{DemoId, EventId, RoomId};

/// Result of the advisory `can_register_for_event` check.
///
/// Serialized exactly as clients expect it: `{"success": bool, "message": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionCheck {
    pub success: bool,
    pub message: String,
}

impl AdmissionCheck {
    pub fn allowed() -> Self {
        Self {
            success: true,
            message: "You can register for this event".to_string(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Returned by a successful registration commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub event_id: EventId,
    pub events_used: i32,
    pub events_quota: i32,
    pub current_attendees: i32,
}

/// Returned by a successful demo registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoRegistration {
    pub demo_id: DemoId,
    pub events_used: i32,
    pub events_quota: i32,
    pub current_participants: i32,
}

/// Returned when a user takes a seat in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMembership {
    pub room_id: RoomId,
    pub current_participants: i32,
    pub max_participants: i32,
}
