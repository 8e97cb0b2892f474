//! Webhook security tests
//!
//! Stripe signature verification at the HTTP boundary.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use serde_json::{json, Value};

use common::{sign, TestApp, WEBHOOK_SECRET};
use inrooms_db::memory::MemoryStore;

/// A payment failure for a known customer; applying it flips the user to past_due
fn payment_failed(app: &TestApp) -> (Vec<u8>, inrooms_types::UserId) {
    let mut row = MemoryStore::trial_user();
    row.stripe_customer_id = Some("cus_sec".into());
    let id = row.user_id();
    app.store.insert_user(row);

    let payload = serde_json::to_vec(&json!({
        "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
        "type": "invoice.payment_failed",
        "created": Utc::now().timestamp(),
        "data": {"object": {"id": "in_1", "customer": "cus_sec", "subscription": "sub_1"}}
    }))
    .unwrap();
    (payload, id)
}

async fn post(app: &TestApp, payload: &[u8], signature: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/webhooks/stripe");
    if let Some(sig) = signature {
        builder = builder.header("stripe-signature", sig);
    }
    app.send(builder.body(Body::from(payload.to_vec())).unwrap())
        .await
}

fn assert_untouched(app: &TestApp, id: inrooms_types::UserId) {
    assert_eq!(app.store.user(id).unwrap().subscription_status, "trial");
}

#[tokio::test]
async fn test_valid_signature_is_applied() {
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);
    let header = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    let (status, _) = post(&app, &payload, Some(&header)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.user(id).unwrap().subscription_status, "past_due");
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);

    let (status, body) = post(&app, &payload, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["received"], false);
    assert_untouched(&app, id);
}

#[tokio::test]
async fn test_wrong_secret_rejected() {
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);
    let header = sign(&payload, "whsec_attacker", Utc::now().timestamp());

    let (status, _) = post(&app, &payload, Some(&header)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_untouched(&app, id);
}

#[tokio::test]
async fn test_tampered_payload_rejected() {
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);
    let header = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

    let mut tampered = payload.clone();
    tampered.extend_from_slice(b" ");
    let (status, _) = post(&app, &tampered, Some(&header)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_untouched(&app, id);
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);
    let old = Utc::now().timestamp() - 301;
    let header = sign(&payload, WEBHOOK_SECRET, old);

    let (status, _) = post(&app, &payload, Some(&header)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_untouched(&app, id);
}

#[tokio::test]
async fn test_malformed_headers_rejected() {
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);

    for header in ["", "garbage", "t=abc,v1=00", "v1=deadbeef", "t=1700000000"] {
        let (status, _) = post(&app, &payload, Some(header)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{header:?}");
    }
    assert_untouched(&app, id);
}

#[tokio::test]
async fn test_any_matching_v1_accepted_during_rotation() {
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);
    let valid = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());
    let (t, v1) = valid.split_once(",v1=").unwrap();
    let rotated = format!("{t},v1={},v1={v1}", "0".repeat(64));

    let (status, _) = post(&app, &payload, Some(&rotated)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.user(id).unwrap().subscription_status, "past_due");
}

#[tokio::test]
async fn test_webhook_ignores_service_key() {
    // The service key is not a substitute for a signature
    let app = TestApp::new();
    let (payload, id) = payment_failed(&app);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/functions/stripe-checkout")
        .header("authorization", format!("Bearer {}", common::SERVICE_KEY))
        .body(Body::from(payload))
        .unwrap();

    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_untouched(&app, id);
}
