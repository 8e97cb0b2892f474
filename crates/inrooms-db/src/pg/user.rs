//! PostgreSQL user repository implementation

use async_trait::async_trait;
use sqlx::PgPool;

use inrooms_types::UserId;

use crate::error::DbResult;
use crate::models::UserRow;
use crate::repo::{CreateUser, SubscriptionChange, UserRepository};

/// PostgreSQL user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> DbResult<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_firebase_uid(&self, uid: &str) -> DbResult<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE firebase_uid = $1"
        ))
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_stripe_customer_id(&self, customer_id: &str) -> DbResult<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE stripe_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: CreateUser) -> DbResult<UserRow> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            r#"
            INSERT INTO users (id, email, firebase_uid, display_name, role,
                               subscription_status, subscription_plan,
                               events_quota, trial_ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING "#,
            user_columns!()
        ))
        .bind(user.id.0)
        .bind(&user.email)
        .bind(&user.firebase_uid)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.plan.as_str())
        .bind(user.events_quota)
        .bind(user.trial_ends_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn link_firebase_uid(
        &self,
        id: UserId,
        uid: &str,
        display_name: Option<&str>,
    ) -> DbResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            "UPDATE users SET firebase_uid = $2, \
             display_name = COALESCE($3, display_name), ",
            mark_dirty!(),
            " WHERE id = $1 AND (firebase_uid IS NULL OR firebase_uid = $2) RETURNING ",
            user_columns!()
        ))
        .bind(id.0)
        .bind(uid)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn set_stripe_customer_id(&self, id: UserId, customer_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET stripe_customer_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(customer_id)
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn apply_subscription_change(
        &self,
        id: UserId,
        change: SubscriptionChange,
    ) -> DbResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(concat!(
            r#"
            UPDATE users SET
                subscription_status = COALESCE($2, subscription_status),
                subscription_plan = COALESCE($3, subscription_plan),
                events_quota = COALESCE($4, events_quota),
                events_used = CASE WHEN $5 THEN 0 ELSE events_used END,
                stripe_subscription_id = COALESCE($6, stripe_subscription_id),
                stripe_event_at = GREATEST(stripe_event_at, $7),
            "#,
            mark_dirty!(),
            r#"
            WHERE id = $1
              AND ($7::timestamptz IS NULL
                   OR stripe_event_at IS NULL
                   OR stripe_event_at <= $7)
            RETURNING "#,
            user_columns!()
        ))
        .bind(id.0)
        .bind(change.status.map(|s| s.as_str()))
        .bind(change.plan.map(|p| p.as_str()))
        .bind(change.events_quota)
        .bind(change.reset_usage)
        .bind(change.stripe_subscription_id)
        .bind(change.stripe_event_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_pending_sync(&self, limit: i64, max_attempts: i32) -> DbResult<Vec<UserRow>> {
        let rows = sqlx::query_as::<_, UserRow>(concat!(
            "SELECT ",
            user_columns!(),
            r#"
            FROM users
            WHERE needs_firebase_sync
              AND firebase_uid IS NOT NULL
              AND sync_attempts < $1
            ORDER BY updated_at
            LIMIT $2
            "#
        ))
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn complete_sync(&self, id: UserId, version: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET needs_firebase_sync = FALSE, sync_attempts = 0,
                last_sync_error = NULL, last_synced_at = NOW()
            WHERE id = $1 AND sync_version = $2
            "#,
        )
        .bind(id.0)
        .bind(version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_sync_failure(&self, id: UserId, error: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE users SET sync_attempts = sync_attempts + 1, last_sync_error = $2 WHERE id = $1",
        )
        .bind(id.0)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
