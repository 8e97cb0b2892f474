//! Payment provider abstraction

use async_trait::async_trait;

use inrooms_types::{CheckoutKind, CheckoutSession};

use crate::BillingError;

/// Everything needed to open a hosted checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub kind: CheckoutKind,
    /// Copied onto the session (and the subscription, for plan checkouts)
    /// so webhooks can be attributed
    pub metadata: Vec<(String, String)>,
    pub client_reference_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// A stored card or other payment method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMethod {
    pub id: String,
    /// Owning customer; `None` once detached
    pub customer_id: Option<String>,
}

/// Payment provider trait
///
/// Abstracts payment processing so the service can be tested without Stripe.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer and return its ID
    async fn create_customer(&self, email: &str, name: Option<&str>)
        -> Result<String, BillingError>;

    /// Create a checkout session
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError>;

    async fn get_payment_method(&self, payment_method_id: &str)
        -> Result<PaymentMethod, BillingError>;

    async fn detach_payment_method(&self, payment_method_id: &str) -> Result<(), BillingError>;
}
