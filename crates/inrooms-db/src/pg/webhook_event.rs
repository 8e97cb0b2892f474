//! PostgreSQL webhook idempotency log

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::DbResult;
use crate::repo::WebhookEventRepository;

/// PostgreSQL webhook event repository
#[derive(Clone)]
pub struct PgWebhookEventRepository {
    pool: PgPool,
}

impl PgWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PgWebhookEventRepository {
    async fn claim(&self, event_id: &str, event_type: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, event_id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM processed_webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
