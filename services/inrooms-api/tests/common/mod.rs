//! Test application wired to in-memory stores

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tower::ServiceExt;

use inrooms_api::support::SupportClient;
use inrooms_api::{build_router, AppState, Config};
use inrooms_billing_core::BillingService;
use inrooms_db::memory::MemoryStore;
use inrooms_sync::{MemoryDocumentStore, RetryConfig, SyncService};

pub const SERVICE_KEY: &str = "test-service-role-key-0001";
pub const WEBHOOK_SECRET: &str = "whsec_router_tests";

pub struct TestApp {
    pub store: MemoryStore,
    pub docs: MemoryDocumentStore,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_env(&[])
    }

    /// Build the app with extra environment overrides, e.g. a Stripe or
    /// OpenAI base URL pointing at a mock server.
    pub fn with_env(overrides: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("DATABASE_URL", "postgres://unused"),
            ("SERVICE_ROLE_KEY", SERVICE_KEY),
            ("STRIPE_SECRET_KEY", "sk_test_router"),
            ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("STRIPE_PRICE_STARTER", "price_starter"),
            ("STRIPE_PRICE_PROFESSIONAL", "price_pro"),
            ("STRIPE_PRICE_ENTERPRISE", "price_ent"),
            ("STRIPE_PRICE_FEATURED_DEMO", "price_feature"),
            ("FIRESTORE_PROJECT_ID", "inrooms-test"),
            ("FIRESTORE_ACCESS_TOKEN", "unused"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in overrides {
            vars.insert(k.to_string(), v.to_string());
        }
        let mut config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        if let Some(base) = vars.get("STRIPE_API_BASE") {
            config.billing = config.billing.with_api_base(base.clone());
        }
        config.sync.write_retry = RetryConfig::new().with_max_attempts(0);

        let store = MemoryStore::new();
        let repos = store.repositories();
        let docs = MemoryDocumentStore::new();

        let billing = BillingService::new(repos.clone(), config.billing.clone()).unwrap();
        let sync = SyncService::new(repos.clone(), Arc::new(docs.clone()), config.sync.clone());
        let support = config
            .support
            .clone()
            .map(|support| SupportClient::new(support).unwrap());

        let state = AppState::new(repos, billing, sync, support, config);
        Self {
            store,
            docs,
            router: build_router(state, None),
        }
    }

    /// Send an authenticated JSON request
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {SERVICE_KEY}"));
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Deliver a signed Stripe event to `path`
    pub async fn deliver_webhook(&self, path: &str, payload: &[u8]) -> (StatusCode, Value) {
        let timestamp = chrono::Utc::now().timestamp();
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("stripe-signature", sign(payload, WEBHOOK_SECRET, timestamp))
            .body(Body::from(payload.to_vec()))
            .unwrap();
        self.send(request).await
    }
}

/// Stripe-style signature header for a payload
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
