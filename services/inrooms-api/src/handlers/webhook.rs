//! Stripe webhook handler

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

use crate::handlers::shared::record_op_duration;
use crate::state::AppState;

/// POST /functions/stripe-checkout, POST /webhooks/stripe
///
/// Authenticated by the `Stripe-Signature` header, not the service key.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let start = Instant::now();

    // Extract Stripe signature header
    let Some(sig_header) = headers.get("stripe-signature") else {
        tracing::warn!("Missing Stripe-Signature header");
        return rejected("missing Stripe-Signature header");
    };

    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid Stripe-Signature header encoding");
        return rejected("invalid Stripe-Signature header");
    };

    match state.billing.process_webhook(&body, signature).await {
        Ok(outcome) => {
            metrics::counter!("billing_webhooks_processed_total", "status" => outcome.as_str())
                .increment(1);
            record_op_duration("process_webhook", start, true);

            (
                StatusCode::OK,
                Json(json!({ "received": true, "outcome": outcome.as_str() })),
            )
        }
        Err(e) if e.is_webhook_rejection() => {
            tracing::warn!(error = %e, "Webhook rejected");
            metrics::counter!("billing_webhooks_processed_total", "status" => "rejected")
                .increment(1);
            record_op_duration("process_webhook", start, false);
            rejected(&e.to_string())
        }
        Err(e) => {
            // 500 makes Stripe redeliver later
            tracing::error!(error = ?e, "Webhook processing failed");
            metrics::counter!("billing_webhooks_processed_total", "status" => "error").increment(1);
            record_op_duration("process_webhook", start, false);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "received": false })),
            )
        }
    }
}

fn rejected(reason: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "received": false, "error": reason })),
    )
}
