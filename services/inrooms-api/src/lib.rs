//! inRooms API
//!
//! HTTP service in front of the inRooms backend crates.
//!
//! ## Functions (`POST /functions/<name>`)
//!
//! - `create-checkout-session` - Subscription checkout for a plan
//! - `feature-demo` - One-time checkout that promotes a demo
//! - `custom-quote` - Enterprise quote request
//! - `delete-payment-method` - Detach a saved card the user owns
//! - `firebase-sync` - Push one user (or every pending user) to Firestore
//! - `sync-user` - Link a Firebase identity and sync it
//! - `chat-support` - Support assistant
//! - `stripe-checkout` - Stripe webhook receiver (also `/webhooks/stripe`)
//!
//! ## Registration API (`/api/v1`)
//!
//! - `POST /events`, `GET /events/{id}`
//! - `GET /events/{id}/eligibility?user_id=` - Advisory admission check
//! - `POST /events/{id}/registrations` - Atomic registration
//! - `GET /users/{id}/registrations`, `GET /users/{id}/subscription`
//! - `POST /demos`, `GET /demos/{id}`, `POST /demos/{id}/registrations`,
//!   `DELETE /demos/{id}/registrations/{user_id}`,
//!   `POST /demos/{id}/recording`, `POST /demos/{id}/feature`
//! - `POST /rooms`, `GET /rooms/{id}`, `POST /rooms/{id}/participants`,
//!   `DELETE /rooms/{id}/participants/{user_id}`
//!
//! Everything except the webhook and health routes requires
//! `Authorization: Bearer <SERVICE_ROLE_KEY>`.
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod support;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers::{demos, events, functions, rooms};

pub use crate::config::{Config, ConfigError};
pub use crate::error::{ApiError, ApiResult};
pub use crate::state::AppState;

/// Build the HTTP router
pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 registration routes
    let api_v1 = Router::new()
        .route("/events", post(events::create_event))
        .route("/events/{id}", get(events::get_event))
        .route("/events/{id}/eligibility", get(events::check_eligibility))
        .route("/events/{id}/registrations", post(events::register_for_event))
        .route("/users/{id}/registrations", get(events::get_user_registrations))
        .route("/users/{id}/subscription", get(events::get_user_subscription))
        .route("/demos", post(demos::create_demo))
        .route("/demos/{id}", get(demos::get_demo))
        .route("/demos/{id}/registrations", post(demos::register_for_demo))
        .route(
            "/demos/{id}/registrations/{user_id}",
            delete(demos::cancel_demo_registration),
        )
        .route("/demos/{id}/recording", post(demos::upload_recording))
        .route("/demos/{id}/feature", post(demos::feature_demo))
        .route("/rooms", post(rooms::create_room))
        .route("/rooms/{id}", get(rooms::get_room))
        .route("/rooms/{id}/participants", post(rooms::join_room))
        .route(
            "/rooms/{id}/participants/{user_id}",
            delete(rooms::leave_room),
        );

    // Serverless function equivalents
    let functions = Router::new()
        .route(
            "/create-checkout-session",
            post(functions::create_checkout_session),
        )
        .route("/feature-demo", post(functions::feature_demo_checkout))
        .route("/custom-quote", post(functions::custom_quote))
        .route(
            "/delete-payment-method",
            post(functions::delete_payment_method),
        )
        .route("/firebase-sync", post(functions::firebase_sync))
        .route("/sync-user", post(functions::sync_user))
        .route("/chat-support", post(functions::chat_support));

    // Service key required on everything above
    let protected = Router::new()
        .nest("/api/v1", api_v1)
        .nest("/functions", functions)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_service_key,
        ));

    // Webhook routes (raw body, signature-authenticated)
    let webhook_routes = Router::new()
        .route("/webhooks/stripe", post(handlers::stripe_webhook))
        .route("/functions/stripe-checkout", post(handlers::stripe_webhook));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(protected)
        .merge(webhook_routes)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}
