//! Sync errors

use thiserror::Error;

use crate::retry::RetryableError;

/// Sync errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("user not found")]
    UserNotFound,

    /// The user has no Firebase identity to mirror to yet
    #[error("user has no linked Firebase account")]
    NotLinked,

    /// The email belongs to a user already linked to a different Firebase uid
    #[error("email is linked to another Firebase account")]
    IdentityConflict,

    /// Firestore answered with a non-success status
    #[error("firestore returned {status}: {message}")]
    Firestore { status: u16, message: String },

    /// Request never got an answer
    #[error("firestore request failed: {0}")]
    Transport(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] inrooms_db::DbError),
}

impl SyncError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Firestore { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) | Self::Database(_) => true,
            Self::UserNotFound
            | Self::NotLinked
            | Self::IdentityConflict
            | Self::InvalidInput(_) => false,
        }
    }

    /// Short label for metrics
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::UserNotFound => "not_found",
            Self::NotLinked => "not_linked",
            Self::IdentityConflict => "conflict",
            Self::Firestore { .. } | Self::Transport(_) => "upstream_error",
            Self::InvalidInput(_) => "invalid",
            Self::Database(_) => "error",
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        SyncError::is_retryable(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let firestore = |status| SyncError::Firestore {
            status,
            message: String::new(),
        };
        assert!(firestore(503).is_retryable());
        assert!(firestore(429).is_retryable());
        assert!(!firestore(403).is_retryable());
        assert!(!firestore(400).is_retryable());
        assert!(SyncError::Transport("reset".into()).is_retryable());
        assert!(!SyncError::NotLinked.is_retryable());
    }
}
