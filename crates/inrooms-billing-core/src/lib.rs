//! inRooms Billing Core - Stripe billing
//!
//! Subscription and featured-demo checkouts, payment method management,
//! custom quotes, and the webhook pipeline that turns Stripe events into
//! subscription changes on the authoritative user row.
//!
//! # Example
//!
//! ```rust,ignore
//! use inrooms_billing_core::{BillingConfig, BillingService};
//! use inrooms_types::Plan;
//!
//! let config = BillingConfig::new("sk_test_...", "whsec_...")
//!     .with_price(Plan::Professional, "price_...");
//!
//! let billing = BillingService::new(repos, config)?;
//! let session = billing
//!     .create_subscription_checkout(user_id, Plan::Professional, None, None)
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod provider;
pub mod service;
pub mod stripe;
pub mod webhook;

pub use config::BillingConfig;
pub use error::BillingError;
pub use provider::{CheckoutRequest, PaymentMethod, PaymentProvider};
pub use service::{BillingService, CustomQuoteRequest, WebhookOutcome};
pub use stripe::StripeProvider;
pub use webhook::{WebhookEvent, WebhookEventData, WebhookEventType, WebhookHandler};

// Re-export checkout types from inrooms-types for convenience
pub use inrooms_types::{CheckoutKind, CheckoutSession};
