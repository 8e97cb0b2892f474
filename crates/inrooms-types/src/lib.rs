//! inRooms Types - Shared domain types
//!
//! This crate contains domain types used across inRooms services:
//! - Identifiers for users, events, demos and rooms
//! - Subscription state, plans and quotas
//! - Event, demo and room listings with their capacity counters
//! - Admission outcomes and the recording visibility policy
//! - Billing checkout types

pub mod admission;
pub mod billing;
pub mod catalog;
pub mod error;
pub mod ids;
pub mod plan;
pub mod subscription;
pub mod visibility;

pub use admission::*;
pub use billing::*;
pub use catalog::*;
pub use error::*;
pub use ids::*;
pub use plan::*;
pub use subscription::*;
pub use visibility::*;
