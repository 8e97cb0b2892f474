//! PostgreSQL event repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use inrooms_types::{EventId, UserId};

use super::admission::{self, Seats};
use crate::error::DbResult;
use crate::models::EventRow;
use crate::repo::{CreateEvent, EventRepository, RegistrationOutcome};

/// PostgreSQL event repository
#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Create a new event repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn create(&self, event: CreateEvent) -> DbResult<EventRow> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            INSERT INTO events (id, host_id, title, description, starts_at, max_attendees)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, host_id, title, description, starts_at, max_attendees,
                      current_attendees, created_at
            "#,
        )
        .bind(event.id.0)
        .bind(event.host_id.0)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.starts_at)
        .bind(event.max_attendees)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: EventId) -> DbResult<Option<EventRow>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, host_id, title, description, starts_at, max_attendees,
                   current_attendees, created_at
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self))]
    async fn register_user(
        &self,
        user_id: UserId,
        event_id: EventId,
        now: DateTime<Utc>,
    ) -> DbResult<RegistrationOutcome> {
        let mut tx = self.pool.begin().await?;

        if admission::find_user(&mut *tx, user_id.0).await?.is_none() {
            return Ok(RegistrationOutcome::UserNotFound);
        }
        let event: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM events WHERE id = $1")
            .bind(event_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if event.is_none() {
            return Ok(RegistrationOutcome::TargetNotFound);
        }

        // A concurrent insert of the same pair blocks here until the other
        // transaction finishes, then either conflicts or proceeds.
        let inserted = sqlx::query(
            "INSERT INTO event_registrations (user_id, event_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.0)
        .bind(event_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if inserted == 0 {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        let quota = match admission::consume_quota(&mut tx, user_id.0, now).await? {
            Ok(quota) => quota,
            Err(denied) => {
                tx.rollback().await?;
                return Ok(denied);
            }
        };

        let (current, max) = match admission::take_seat(&mut tx, Seats::Event, event_id.0).await? {
            Ok(counts) => counts,
            Err(denied) => {
                tx.rollback().await?;
                return Ok(denied);
            }
        };

        tx.commit().await?;

        Ok(RegistrationOutcome::Registered {
            current,
            max,
            quota: Some(quota),
        })
    }

    async fn is_registered(&self, user_id: UserId, event_id: EventId) -> DbResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM event_registrations WHERE user_id = $1 AND event_id = $2)",
        )
        .bind(user_id.0)
        .bind(event_id.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn registrations_for_user(&self, user_id: UserId) -> DbResult<Vec<EventId>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT event_id
            FROM event_registrations
            WHERE user_id = $1
            ORDER BY registered_at DESC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| EventId(id)).collect())
    }
}
