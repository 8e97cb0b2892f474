//! PostgreSQL demo repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use inrooms_types::{DemoId, UserId};

use super::admission::{self, Seats};
use crate::error::DbResult;
use crate::models::DemoRow;
use crate::repo::{CreateDemo, DemoRepository, RegistrationOutcome};

macro_rules! demo_columns {
    () => {
        "id, host_id, title, description, scheduled_at, max_participants, \
         current_participants, recording_url, recording_visible_until, \
         is_featured, featured_until, created_at"
    };
}

/// PostgreSQL demo repository
#[derive(Clone)]
pub struct PgDemoRepository {
    pool: PgPool,
}

impl PgDemoRepository {
    /// Create a new demo repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DemoRepository for PgDemoRepository {
    async fn create(&self, demo: CreateDemo) -> DbResult<DemoRow> {
        let row = sqlx::query_as::<_, DemoRow>(concat!(
            r#"
            INSERT INTO demos (id, host_id, title, description, scheduled_at, max_participants)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING "#,
            demo_columns!()
        ))
        .bind(demo.id.0)
        .bind(demo.host_id.0)
        .bind(&demo.title)
        .bind(&demo.description)
        .bind(demo.scheduled_at)
        .bind(demo.max_participants)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: DemoId) -> DbResult<Option<DemoRow>> {
        let row = sqlx::query_as::<_, DemoRow>(concat!(
            "SELECT ",
            demo_columns!(),
            " FROM demos WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self))]
    async fn register_user(
        &self,
        user_id: UserId,
        demo_id: DemoId,
        now: DateTime<Utc>,
    ) -> DbResult<RegistrationOutcome> {
        let mut tx = self.pool.begin().await?;

        if admission::find_user(&mut *tx, user_id.0).await?.is_none() {
            return Ok(RegistrationOutcome::UserNotFound);
        }
        let demo: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM demos WHERE id = $1")
            .bind(demo_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if demo.is_none() {
            return Ok(RegistrationOutcome::TargetNotFound);
        }

        let inserted = sqlx::query(
            "INSERT INTO demo_registrations (user_id, demo_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id.0)
        .bind(demo_id.0)
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

        let (current, max) = match admission::take_seat(&mut tx, Seats::Demo, demo_id.0).await? {
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

    async fn cancel_registration(&self, user_id: UserId, demo_id: DemoId) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM demo_registrations WHERE user_id = $1 AND demo_id = $2",
        )
        .bind(user_id.0)
        .bind(demo_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }

        admission::release_seat(&mut tx, Seats::Demo, demo_id.0).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn set_recording(
        &self,
        id: DemoId,
        recording_url: &str,
        visible_until: DateTime<Utc>,
    ) -> DbResult<Option<DemoRow>> {
        let row = sqlx::query_as::<_, DemoRow>(concat!(
            "UPDATE demos SET recording_url = $2, recording_visible_until = $3 \
             WHERE id = $1 RETURNING ",
            demo_columns!()
        ))
        .bind(id.0)
        .bind(recording_url)
        .bind(visible_until)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn set_featured(
        &self,
        id: DemoId,
        featured: bool,
        featured_until: Option<DateTime<Utc>>,
    ) -> DbResult<Option<DemoRow>> {
        let row = sqlx::query_as::<_, DemoRow>(concat!(
            "UPDATE demos SET is_featured = $2, featured_until = $3 \
             WHERE id = $1 RETURNING ",
            demo_columns!()
        ))
        .bind(id.0)
        .bind(featured)
        .bind(featured_until)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
