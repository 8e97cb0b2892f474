//! Billing configuration

use std::collections::HashMap;
use std::time::Duration;

use inrooms_types::Plan;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Billing service configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret
    pub stripe_webhook_secret: String,
    /// Map of plans to Stripe price IDs
    pub price_ids: HashMap<Plan, String>,
    /// One-time price for promoting a demo
    pub featured_demo_price_id: Option<String>,
    /// Default success URL for checkout
    pub default_success_url: String,
    /// Default cancel URL for checkout
    pub default_cancel_url: String,
    /// Stripe API base, overridable for tests
    pub api_base: String,
    /// Timeout for Stripe requests
    pub timeout: Duration,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(
        stripe_secret_key: impl Into<String>,
        stripe_webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            stripe_secret_key: stripe_secret_key.into(),
            stripe_webhook_secret: stripe_webhook_secret.into(),
            price_ids: HashMap::new(),
            featured_demo_price_id: None,
            default_success_url: "https://app.inrooms.io/billing/success".to_string(),
            default_cancel_url: "https://app.inrooms.io/billing/cancel".to_string(),
            api_base: STRIPE_API_BASE.to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    /// Set price ID for a plan
    pub fn with_price(mut self, plan: Plan, price_id: impl Into<String>) -> Self {
        self.price_ids.insert(plan, price_id.into());
        self
    }

    pub fn with_featured_demo_price(mut self, price_id: impl Into<String>) -> Self {
        self.featured_demo_price_id = Some(price_id.into());
        self
    }

    /// Set default URLs
    pub fn with_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.default_success_url = success_url.into();
        self.default_cancel_url = cancel_url.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Get price ID for a plan
    pub fn get_price_id(&self, plan: Plan) -> Option<&str> {
        self.price_ids.get(&plan).map(String::as_str)
    }

    /// Reverse lookup used when a subscription event only carries a price
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        self.price_ids
            .iter()
            .find(|(_, id)| id.as_str() == price_id)
            .map(|(plan, _)| *plan)
    }
}
