//! inRooms Events Core - Admission control
//!
//! Registration for events, demos and rooms on top of the atomic
//! repository operations in `inrooms-db`, plus recording uploads with the
//! server-side visibility policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use inrooms_events_core::EventService;
//!
//! let events = EventService::new(repos);
//!
//! // Advisory: drives the register button
//! let check = events.can_register_for_event(user_id, event_id).await?;
//!
//! // Authoritative: atomic check-and-commit
//! let receipt = events.register_for_event(user_id, event_id).await?;
//! ```

pub mod demo;
pub mod error;
pub mod event;
pub mod room;
mod validate;

pub use demo::{DemoService, NewDemo, RecordingUpload};
pub use error::AdmissionError;
pub use event::{EventService, NewEvent};
pub use room::RoomService;
