//! Billing errors

use thiserror::Error;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// User has no Stripe customer yet
    #[error("customer not found")]
    CustomerNotFound,

    /// User not found
    #[error("user not found")]
    UserNotFound,

    #[error("demo not found")]
    DemoNotFound,

    /// Only the host can promote a demo
    #[error("only the demo host can do this")]
    NotDemoHost,

    #[error("payment method not found")]
    PaymentMethodNotFound,

    /// Payment method belongs to another customer
    #[error("payment method does not belong to this user")]
    PaymentMethodNotOwned,

    /// No price configured for the requested plan or product
    #[error("no price configured for {0}")]
    PriceNotConfigured(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Payment provider error
    #[error("provider error: {message}")]
    ProviderError {
        /// HTTP status from the provider, if one was received
        status: Option<u16>,
        message: String,
    },

    /// Missing, malformed, stale or forged `Stripe-Signature`
    #[error("webhook signature rejected: {0}")]
    InvalidSignature(String),

    /// Signed payload that could not be understood
    #[error("webhook error: {0}")]
    WebhookError(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] inrooms_db::DbError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    pub(crate) fn provider(message: impl Into<String>) -> Self {
        Self::ProviderError {
            status: None,
            message: message.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CustomerNotFound
                | Self::UserNotFound
                | Self::DemoNotFound
                | Self::PaymentMethodNotFound
        )
    }

    /// Check if this is a provider error
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::ProviderError { .. })
    }

    /// Rejected webhook input (answer 400, Stripe will not fix it by retrying)
    pub fn is_webhook_rejection(&self) -> bool {
        matches!(self, Self::InvalidSignature(_) | Self::WebhookError(_))
    }
}
