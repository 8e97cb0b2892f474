//! Billing and payment types

use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// Checkout session returned to the client for redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe checkout session ID
    pub session_id: String,
    /// Hosted checkout URL
    pub url: String,
}

/// What a checkout session pays for. Carried in Stripe metadata so the
/// webhook knows how to fulfil it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutKind {
    /// Recurring plan subscription
    Subscription,
    /// One-time payment to promote a demo
    FeaturedDemo,
}

impl CheckoutKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::FeaturedDemo => "featured_demo",
        }
    }
}

impl std::str::FromStr for CheckoutKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscription" => Ok(Self::Subscription),
            "featured_demo" => Ok(Self::FeaturedDemo),
            _ => Err(ParseEnumError::new("checkout kind", s)),
        }
    }
}

/// How long a paid demo promotion lasts
pub const FEATURED_DEMO_DAYS: i64 = 30;
