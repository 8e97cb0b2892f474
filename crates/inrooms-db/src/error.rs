//! Database errors

use thiserror::Error;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration failure at startup
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// A stored value failed to parse into its domain type
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

impl From<inrooms_types::ParseEnumError> for DbError {
    fn from(e: inrooms_types::ParseEnumError) -> Self {
        Self::InvalidData(e.to_string())
    }
}

/// Result alias for repository operations
pub type DbResult<T> = Result<T, DbError>;
