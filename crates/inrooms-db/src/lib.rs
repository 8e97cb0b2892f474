//! inRooms DB - Authoritative store
//!
//! SQLx-based database layer. Postgres is the source of truth for
//! subscriptions, quotas and registrations; the Firestore copy is derived
//! from it (see `inrooms-sync`).
//!
//! Registration methods run their whole check-and-commit inside one
//! transaction using guarded `UPDATE ... WHERE counter < limit` statements,
//! so concurrent callers can never push a counter past its limit.
//!
//! # Example
//!
//! ```rust,ignore
//! use inrooms_db::{create_pool, Repositories};
//!
//! let pool = create_pool("postgres://localhost/inrooms").await?;
//! let repos = Repositories::postgres(pool);
//!
//! let outcome = repos.events.register_user(user_id, event_id, Utc::now()).await?;
//! ```

pub mod error;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pool::{
    create_pool, create_pool_with_options, run_migrations, DbPool, PoolOptions, MIGRATOR,
};
pub use repo::*;
