//! Admission errors

use inrooms_db::{DbError, QuotaUsage, RegistrationOutcome};
use thiserror::Error;

/// Why a registration, cancellation or listing operation was refused
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("user not found")]
    UserNotFound,

    #[error("event not found")]
    EventNotFound,

    #[error("demo not found")]
    DemoNotFound,

    #[error("room not found")]
    RoomNotFound,

    #[error("you are already registered")]
    AlreadyRegistered,

    #[error("you are not registered")]
    NotRegistered,

    #[error("your subscription is not active")]
    SubscriptionInactive,

    /// Monthly event quota used up
    #[error("you have used {used} of {quota} events this period; upgrade your plan to register for more")]
    QuotaExceeded { used: i32, quota: i32 },

    /// No seats left
    #[error("this session is full ({current}/{max})")]
    CapacityReached { current: i32, max: i32 },

    /// Only the host may change this demo
    #[error("only the host can do this")]
    NotHost,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] DbError),
}

impl AdmissionError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound
                | Self::EventNotFound
                | Self::DemoNotFound
                | Self::RoomNotFound
                | Self::NotRegistered
        )
    }

    /// Conflicts with current state (retrying will not help)
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered
                | Self::SubscriptionInactive
                | Self::QuotaExceeded { .. }
                | Self::CapacityReached { .. }
        )
    }

    /// Short label for metrics
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::UserNotFound
            | Self::EventNotFound
            | Self::DemoNotFound
            | Self::RoomNotFound
            | Self::NotRegistered => "not_found",
            Self::AlreadyRegistered => "already_registered",
            Self::SubscriptionInactive => "inactive",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::CapacityReached { .. } => "full",
            Self::NotHost => "forbidden",
            Self::InvalidInput(_) => "invalid",
            Self::Database(_) => "error",
        }
    }
}

/// Seat and quota counters after a successful registration
#[derive(Debug, Clone, Copy)]
pub(crate) struct Admitted {
    pub current: i32,
    pub max: i32,
    pub quota: Option<QuotaUsage>,
}

/// Split a repository outcome into success or a typed refusal.
///
/// `not_found` names the target kind (event, demo or room).
pub(crate) fn admitted(
    outcome: RegistrationOutcome,
    not_found: AdmissionError,
) -> Result<Admitted, AdmissionError> {
    match outcome {
        RegistrationOutcome::Registered {
            current,
            max,
            quota,
        } => Ok(Admitted {
            current,
            max,
            quota,
        }),
        RegistrationOutcome::AlreadyRegistered => Err(AdmissionError::AlreadyRegistered),
        RegistrationOutcome::UserNotFound => Err(AdmissionError::UserNotFound),
        RegistrationOutcome::TargetNotFound => Err(not_found),
        RegistrationOutcome::SubscriptionInactive => Err(AdmissionError::SubscriptionInactive),
        RegistrationOutcome::QuotaExceeded { used, quota } => {
            Err(AdmissionError::QuotaExceeded { used, quota })
        }
        RegistrationOutcome::CapacityReached { current, max } => {
            Err(AdmissionError::CapacityReached { current, max })
        }
    }
}

/// Count a registration attempt by kind and outcome
pub(crate) fn record_attempt<T>(kind: &'static str, result: &Result<T, AdmissionError>) {
    let outcome = match result {
        Ok(_) => "registered",
        Err(e) => e.outcome_label(),
    };
    metrics::counter!("inrooms_registrations_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}
