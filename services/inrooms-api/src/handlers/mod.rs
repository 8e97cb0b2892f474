//! REST API handlers

pub mod demos;
pub mod events;
pub mod functions;
pub mod health;
pub mod rooms;
pub mod shared;
pub mod webhook;

pub use health::*;
pub use webhook::*;
