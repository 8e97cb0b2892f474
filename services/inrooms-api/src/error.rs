//! Error types for the inRooms API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use inrooms_billing_core::BillingError;
use inrooms_events_core::AdmissionError;
use inrooms_sync::SyncError;

use crate::support::SupportError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing or invalid service credentials")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error")]
    Database(#[from] inrooms_db::DbError),

    #[error("{0}")]
    Admission(#[from] AdmissionError),

    #[error("{0}")]
    Billing(#[from] BillingError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Support(#[from] SupportError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Admission(e) => match e {
                e if e.is_not_found() => StatusCode::NOT_FOUND,
                e if e.is_conflict() => StatusCode::CONFLICT,
                AdmissionError::NotHost => StatusCode::FORBIDDEN,
                AdmissionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Billing(e) => match e {
                e if e.is_not_found() => StatusCode::NOT_FOUND,
                e if e.is_provider_error() => StatusCode::BAD_GATEWAY,
                e if e.is_webhook_rejection() => StatusCode::BAD_REQUEST,
                BillingError::NotDemoHost | BillingError::PaymentMethodNotOwned => {
                    StatusCode::FORBIDDEN
                }
                BillingError::InvalidInput(_) | BillingError::PriceNotConfigured(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Sync(e) => match e {
                SyncError::UserNotFound => StatusCode::NOT_FOUND,
                SyncError::NotLinked | SyncError::IdentityConflict => StatusCode::CONFLICT,
                SyncError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                SyncError::Firestore { .. } | SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
                SyncError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Support(e) => match e {
                SupportError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                SupportError::Upstream { .. } | SupportError::Transport(_) => {
                    StatusCode::BAD_GATEWAY
                }
            },
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) | Self::Database(_) => "INTERNAL_ERROR",
            Self::Admission(e) => match e {
                AdmissionError::UserNotFound => "USER_NOT_FOUND",
                AdmissionError::EventNotFound => "EVENT_NOT_FOUND",
                AdmissionError::DemoNotFound => "DEMO_NOT_FOUND",
                AdmissionError::RoomNotFound => "ROOM_NOT_FOUND",
                AdmissionError::NotRegistered => "NOT_REGISTERED",
                AdmissionError::AlreadyRegistered => "ALREADY_REGISTERED",
                AdmissionError::SubscriptionInactive => "SUBSCRIPTION_INACTIVE",
                AdmissionError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
                AdmissionError::CapacityReached { .. } => "CAPACITY_REACHED",
                AdmissionError::NotHost => "FORBIDDEN",
                AdmissionError::InvalidInput(_) => "BAD_REQUEST",
                AdmissionError::Database(_) => "INTERNAL_ERROR",
            },
            Self::Billing(e) => match e {
                BillingError::CustomerNotFound => "CUSTOMER_NOT_FOUND",
                BillingError::UserNotFound => "USER_NOT_FOUND",
                BillingError::DemoNotFound => "DEMO_NOT_FOUND",
                BillingError::PaymentMethodNotFound => "PAYMENT_METHOD_NOT_FOUND",
                BillingError::NotDemoHost | BillingError::PaymentMethodNotOwned => "FORBIDDEN",
                BillingError::PriceNotConfigured(_) | BillingError::InvalidInput(_) => {
                    "BAD_REQUEST"
                }
                BillingError::ProviderError { .. } => "PAYMENT_PROVIDER_ERROR",
                BillingError::InvalidSignature(_) | BillingError::WebhookError(_) => {
                    "WEBHOOK_ERROR"
                }
                BillingError::Database(_) | BillingError::Internal(_) => "INTERNAL_ERROR",
            },
            Self::Sync(e) => match e {
                SyncError::UserNotFound => "USER_NOT_FOUND",
                SyncError::NotLinked => "USER_NOT_LINKED",
                SyncError::IdentityConflict => "IDENTITY_CONFLICT",
                SyncError::InvalidInput(_) => "BAD_REQUEST",
                SyncError::Firestore { .. } | SyncError::Transport(_) => "SYNC_UPSTREAM_ERROR",
                SyncError::Database(_) => "INTERNAL_ERROR",
            },
            Self::Support(e) => match e {
                SupportError::InvalidInput(_) => "BAD_REQUEST",
                SupportError::Upstream { .. } | SupportError::Transport(_) => {
                    "CHAT_UPSTREAM_ERROR"
                }
            },
        }
    }

    /// Structured extras for refusals a client can act on
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Admission(AdmissionError::QuotaExceeded { used, quota }) => {
                Some(serde_json::json!({ "events_used": used, "events_quota": quota }))
            }
            Self::Admission(AdmissionError::CapacityReached { current, max }) => {
                Some(serde_json::json!({ "current": current, "max": max }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log internal errors and keep their details out of the body
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Internal API error");
            "Internal server error".to_string()
        } else {
            if status == StatusCode::BAD_GATEWAY {
                tracing::warn!(error = %self, "Upstream call failed");
            }
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
