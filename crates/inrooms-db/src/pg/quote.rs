//! PostgreSQL custom quote repository implementation

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::QuoteRow;
use crate::repo::{CreateQuote, QuoteRepository};

/// PostgreSQL quote repository
#[derive(Clone)]
pub struct PgQuoteRepository {
    pool: PgPool,
}

impl PgQuoteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuoteRepository for PgQuoteRepository {
    async fn create(&self, quote: CreateQuote) -> DbResult<QuoteRow> {
        let row = sqlx::query_as::<_, QuoteRow>(
            r#"
            INSERT INTO custom_quotes (id, name, email, company, team_size, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, email, company, team_size, message, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&quote.name)
        .bind(&quote.email)
        .bind(&quote.company)
        .bind(quote.team_size)
        .bind(&quote.message)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
