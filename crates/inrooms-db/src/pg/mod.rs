//! PostgreSQL repository implementations

macro_rules! user_columns {
    () => {
        "id, firebase_uid, email, display_name, role, subscription_status, \
         subscription_plan, events_quota, events_used, trial_ends_at, \
         stripe_customer_id, stripe_subscription_id, needs_firebase_sync, \
         sync_version, sync_attempts, last_sync_error, last_synced_at, \
         stripe_event_at, created_at, updated_at"
    };
}

// Appended to every UPDATE that touches a field mirrored to Firestore.
// Resetting the attempt counter revives dead-lettered rows.
macro_rules! mark_dirty {
    () => {
        "needs_firebase_sync = TRUE, sync_version = sync_version + 1, \
         sync_attempts = 0, last_sync_error = NULL, updated_at = NOW()"
    };
}

mod admission;
mod demo;
mod event;
mod quote;
mod room;
mod user;
mod webhook_event;

pub use demo::PgDemoRepository;
pub use event::PgEventRepository;
pub use quote::PgQuoteRepository;
pub use room::PgRoomRepository;
pub use user::PgUserRepository;
pub use webhook_event::PgWebhookEventRepository;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DbResult;
use crate::repo::{Repositories, StoreHealth};
use crate::DbPool;

/// Readiness probe against the pool
#[derive(Clone)]
pub struct PgHealth {
    pool: DbPool,
}

#[async_trait]
impl StoreHealth for PgHealth {
    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl Repositories {
    /// Create all repositories from a database pool
    pub fn postgres(pool: DbPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            events: Arc::new(PgEventRepository::new(pool.clone())),
            demos: Arc::new(PgDemoRepository::new(pool.clone())),
            rooms: Arc::new(PgRoomRepository::new(pool.clone())),
            webhook_events: Arc::new(PgWebhookEventRepository::new(pool.clone())),
            quotes: Arc::new(PgQuoteRepository::new(pool.clone())),
            health: Arc::new(PgHealth { pool }),
        }
    }
}
