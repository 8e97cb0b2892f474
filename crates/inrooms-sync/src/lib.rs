//! inRooms Sync - Firestore mirror of subscription state
//!
//! Postgres holds the authoritative subscription and quota columns. The
//! client app reads a denormalized copy from Firestore. This crate keeps the
//! copy current:
//!
//! - [`SyncService::sync_user`] pushes one user and clears their dirty flag
//!   with a version check
//! - [`SyncService::sync_pending`] drains flagged users in batches
//! - [`SyncSweeper`] runs `sync_pending` in the background with backoff
//!
//! # Example
//!
//! ```rust,ignore
//! use inrooms_sync::{FirestoreClient, FirestoreConfig, SyncConfig, SyncService};
//!
//! let firestore = FirestoreClient::new(FirestoreConfig::new("my-project", token))?;
//! let sync = SyncService::new(repos, Arc::new(firestore), SyncConfig::default());
//!
//! let report = sync.sync_user(user_id).await?;
//! ```

pub mod document;
pub mod error;
pub mod firestore;
pub mod retry;
pub mod service;
pub mod store;
pub mod sweeper;

pub use document::{FieldValue, Fields, UserDocument};
pub use error::SyncError;
pub use firestore::{FirestoreClient, FirestoreConfig};
pub use retry::{RetryConfig, RetryableError};
pub use service::{
    BatchReport, FirebaseIdentity, LinkedUser, SyncConfig, SyncOutcome, SyncReport, SyncService,
};
pub use store::DocumentStore;
#[cfg(any(test, feature = "memory"))]
pub use store::MemoryDocumentStore;
pub use sweeper::SyncSweeper;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sweeper_backs_off_from_interval() {
        let sync = SyncService::new(
            inrooms_db::memory::MemoryStore::new().repositories(),
            std::sync::Arc::new(MemoryDocumentStore::new()),
            SyncConfig {
                interval: Duration::from_secs(30),
                ..SyncConfig::default()
            },
        );
        let sweeper = SyncSweeper::new(sync).with_backoff(
            RetryConfig::new()
                .with_base_delay(Duration::from_secs(30))
                .with_max_delay(Duration::from_secs(600))
                .with_jitter(false),
        );

        assert_eq!(sweeper.next_delay(0), Duration::from_secs(30));
        assert_eq!(sweeper.next_delay(1), Duration::from_secs(30));
        assert_eq!(sweeper.next_delay(2), Duration::from_secs(60));
        assert_eq!(sweeper.next_delay(3), Duration::from_secs(120));
        assert_eq!(sweeper.next_delay(20), Duration::from_secs(600));
    }
}
