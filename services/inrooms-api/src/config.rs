//! Configuration for the inRooms API service.

use std::time::Duration;

use inrooms_billing_core::BillingConfig;
use inrooms_sync::{FirestoreConfig, SyncConfig};
use inrooms_types::Plan;

use crate::support::SupportConfig;

/// API service configuration
#[derive(Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Bearer token required on function and API routes
    pub service_role_key: String,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Firestore target for the user mirror
    pub firestore: FirestoreConfig,
    /// Sync batch and sweeper settings
    pub sync: SyncConfig,
    /// Chat support; `None` disables the function
    pub support: Option<SupportConfig>,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
    /// Apply migrations at startup
    pub run_migrations: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        // Database
        let database_url = required("DATABASE_URL")?;

        // Server
        let http_port = parse_or(&lookup, "HTTP_PORT", 8080)?;
        let service_role_key = required("SERVICE_ROLE_KEY")?;
        if service_role_key.len() < 16 {
            return Err(ConfigError::Invalid("SERVICE_ROLE_KEY"));
        }

        // Stripe
        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        let stripe_webhook_secret = required("STRIPE_WEBHOOK_SECRET")?;

        let default_success_url = lookup("BILLING_SUCCESS_URL")
            .unwrap_or_else(|| "https://app.inrooms.io/billing/success".to_string());
        let default_cancel_url = lookup("BILLING_CANCEL_URL")
            .unwrap_or_else(|| "https://app.inrooms.io/billing/cancel".to_string());

        let mut billing = BillingConfig::new(stripe_secret_key, stripe_webhook_secret)
            .with_urls(default_success_url, default_cancel_url);
        for (plan, key) in [
            (Plan::Starter, "STRIPE_PRICE_STARTER"),
            (Plan::Professional, "STRIPE_PRICE_PROFESSIONAL"),
            (Plan::Enterprise, "STRIPE_PRICE_ENTERPRISE"),
        ] {
            if let Some(price) = lookup(key) {
                billing = billing.with_price(plan, price);
            }
        }
        if let Some(price) = lookup("STRIPE_PRICE_FEATURED_DEMO") {
            billing = billing.with_featured_demo_price(price);
        }

        // Firestore
        let mut firestore = FirestoreConfig::new(
            required("FIRESTORE_PROJECT_ID")?,
            required("FIRESTORE_ACCESS_TOKEN")?,
        );
        if let Some(base_url) = lookup("FIRESTORE_BASE_URL") {
            firestore = firestore.with_base_url(base_url);
        }

        // Sync
        let interval_secs: u64 = parse_or(&lookup, "SYNC_INTERVAL_SECS", 30)?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid("SYNC_INTERVAL_SECS"));
        }
        let sync = SyncConfig {
            batch_size: parse_or(&lookup, "SYNC_BATCH_SIZE", 50)?,
            max_attempts: parse_or(&lookup, "SYNC_MAX_ATTEMPTS", 10)?,
            interval: Duration::from_secs(interval_secs),
            ..SyncConfig::default()
        };

        // Chat support
        let support = lookup("OPENAI_API_KEY")
            .filter(|key| !key.is_empty())
            .map(|api_key| {
                let mut support = SupportConfig::new(api_key);
                if let Some(model) = lookup("OPENAI_MODEL") {
                    support.model = model;
                }
                if let Some(base_url) = lookup("OPENAI_BASE_URL") {
                    support.base_url = base_url;
                }
                support
            });

        // Request timeout
        let request_timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;

        Ok(Self {
            http_port,
            database_url,
            service_role_key,
            billing,
            firestore,
            sync,
            support,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled: flag_or(&lookup, "METRICS_ENABLED", true),
            run_migrations: flag_or(&lookup, "RUN_MIGRATIONS", true),
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("http_port", &self.http_port)
            .field("firestore_project", &self.firestore.project_id)
            .field("sync", &self.sync)
            .field("support_enabled", &self.support.is_some())
            .field("request_timeout", &self.request_timeout)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish_non_exhaustive()
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn flag_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
