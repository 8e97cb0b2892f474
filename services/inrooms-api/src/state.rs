//! Application state for the inRooms API service.

use std::sync::Arc;
use std::time::Duration;

use inrooms_billing_core::BillingService;
use inrooms_db::Repositories;
use inrooms_events_core::{DemoService, EventService, RoomService};
use inrooms_sync::SyncService;

use crate::config::Config;
use crate::support::SupportClient;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub events: EventService,
    pub demos: DemoService,
    pub rooms: RoomService,
    /// Stripe checkout, payment methods, quotes and webhooks
    pub billing: Arc<BillingService>,
    /// Firestore mirror of subscription state
    pub sync: SyncService,
    /// Chat support; `None` when no OpenAI key is configured
    pub support: Option<SupportClient>,
    /// Repositories, for readiness checks
    pub repos: Repositories,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        repos: Repositories,
        billing: BillingService,
        sync: SyncService,
        support: Option<SupportClient>,
        config: Config,
    ) -> Self {
        Self {
            events: EventService::new(repos.clone()),
            demos: DemoService::new(repos.clone()),
            rooms: RoomService::new(repos.clone()),
            billing: Arc::new(billing),
            sync,
            support,
            repos,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
