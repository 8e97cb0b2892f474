//! Serverless function routes through the full router

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::TestApp;
use inrooms_db::memory::MemoryStore;
use inrooms_sync::FieldValue;
use inrooms_types::{Plan, SubscriptionStatus};

#[tokio::test]
async fn test_firebase_sync_mirrors_active_status() {
    let app = TestApp::new();
    let mut row = MemoryStore::test_user(SubscriptionStatus::Active, Plan::Starter, 1, 5);
    row.needs_firebase_sync = true;
    let uid = row.firebase_uid.clone().unwrap();
    let user_id = row.user_id();
    app.store.insert_user(row);

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/firebase-sync",
            Some(json!({ "user_id": user_id.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "synced");
    assert_eq!(body["firebase_uid"], uid.as_str());

    assert_eq!(
        app.docs.subscription_field(&uid, "status"),
        Some(FieldValue::string("active"))
    );
    assert!(!app.store.user(user_id).unwrap().needs_firebase_sync);
}

#[tokio::test]
async fn test_firebase_sync_without_user_drains_queue() {
    let app = TestApp::new();
    for _ in 0..3 {
        let mut row = MemoryStore::trial_user();
        row.needs_firebase_sync = true;
        app.store.insert_user(row);
    }

    let (status, body) = app.call(Method::POST, "/functions/firebase-sync", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["attempted"], 3);
    assert_eq!(body["synced"], 3);
    assert_eq!(app.docs.writes(), 3);
}

#[tokio::test]
async fn test_firebase_sync_reports_firestore_failure() {
    let app = TestApp::new();
    let mut row = MemoryStore::trial_user();
    row.needs_firebase_sync = true;
    let user_id = row.user_id();
    app.store.insert_user(row);
    app.docs.fail_next(1);

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/firebase-sync",
            Some(json!({ "user_id": user_id.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "SYNC_UPSTREAM_ERROR");

    let row = app.store.user(user_id).unwrap();
    assert!(row.needs_firebase_sync);
    assert_eq!(row.sync_attempts, 1);
}

#[tokio::test]
async fn test_sync_user_creates_trial_user() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/sync-user",
            Some(json!({
                "firebase_uid": "fb-new-user",
                "email": "new@example.com",
                "display_name": "New User"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["created"], true);
    assert_eq!(body["sync"]["outcome"], "synced");
    assert_eq!(
        app.docs.subscription_field("fb-new-user", "status"),
        Some(FieldValue::string("trial"))
    );

    // Second sign-in finds the same user
    let (_, again) = app
        .call(
            Method::POST,
            "/functions/sync-user",
            Some(json!({ "firebase_uid": "fb-new-user", "email": "new@example.com" })),
        )
        .await;
    assert_eq!(again["created"], false);
    assert_eq!(again["user_id"], body["user_id"]);
}

#[tokio::test]
async fn test_sync_user_conflicting_uid_for_email() {
    let app = TestApp::new();
    let first = json!({ "firebase_uid": "fb-first", "email": "shared@example.com" });
    let (status, _) = app
        .call(Method::POST, "/functions/sync-user", Some(first))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/sync-user",
            Some(json!({ "firebase_uid": "fb-second", "email": "shared@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "IDENTITY_CONFLICT");
    assert!(app.docs.subscription_field("fb-second", "status").is_none());
}

#[tokio::test]
async fn test_checkout_session_through_stripe() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_router" })))
        .expect(1)
        .mount(&stripe)
        .await;
    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(body_string_contains("price_pro"))
        .and(body_string_contains("mode=subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_router",
            "url": "https://checkout.stripe.com/c/pay/cs_router"
        })))
        .expect(1)
        .mount(&stripe)
        .await;

    let app = TestApp::with_env(&[("STRIPE_API_BASE", &stripe.uri())]);
    let user = MemoryStore::trial_user();
    let user_id = user.user_id();
    app.store.insert_user(user);

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/create-checkout-session",
            Some(json!({ "user_id": user_id.to_string(), "plan": "professional" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["session_id"], "cs_router");
    assert_eq!(
        app.store.user(user_id).unwrap().stripe_customer_id.as_deref(),
        Some("cus_router")
    );

    let (status, _) = app
        .call(
            Method::POST,
            "/functions/create-checkout-session",
            Some(json!({ "user_id": user_id.to_string(), "plan": "platinum" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_activates_subscription() {
    let app = TestApp::new();
    let mut row = MemoryStore::trial_user();
    row.stripe_customer_id = Some("cus_hook".into());
    let user_id = row.user_id();
    app.store.insert_user(row);

    let payload = serde_json::to_vec(&json!({
        "id": "evt_router_1",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {"object": {
            "id": "cs_1",
            "customer": "cus_hook",
            "subscription": "sub_1",
            "payment_status": "paid",
            "metadata": {"user_id": user_id.to_string(), "plan": "enterprise", "kind": "subscription"}
        }}
    }))
    .unwrap();

    let (status, body) = app
        .deliver_webhook("/functions/stripe-checkout", &payload)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let row = app.store.user(user_id).unwrap();
    assert_eq!(row.subscription_status, "active");
    assert_eq!(row.events_quota, 50);
    assert!(row.needs_firebase_sync);

    // Redelivery through the other mount point is a no-op
    let (status, body) = app.deliver_webhook("/webhooks/stripe", &payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");
}

#[tokio::test]
async fn test_custom_quote() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/custom-quote",
            Some(json!({
                "name": "Grace",
                "email": "grace@example.com",
                "company": "Compilers Inc",
                "team_size": 400
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "new");

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/custom-quote",
            Some(json!({ "name": "", "email": "grace@example.com", "company": "X" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_delete_payment_method_requires_customer() {
    let app = TestApp::new();
    let user = MemoryStore::trial_user();
    let user_id = user.user_id();
    app.store.insert_user(user);

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/delete-payment-method",
            Some(json!({ "user_id": user_id.to_string(), "payment_method_id": "pm_123" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "CUSTOMER_NOT_FOUND");

    let (status, _) = app
        .call(
            Method::POST,
            "/functions/delete-payment-method",
            Some(json!({ "user_id": user_id.to_string(), "payment_method_id": "card_123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_support_disabled_without_key() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/functions/chat-support",
            Some(json!({ "messages": [{"role": "user", "content": "hi"}] })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_chat_support_proxies_to_openai() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test-openai"))
        .and(body_string_contains("inRooms support assistant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Upgrade under Billing."}}]
        })))
        .expect(1)
        .mount(&openai)
        .await;

    let app = TestApp::with_env(&[
        ("OPENAI_API_KEY", "sk-test-openai"),
        ("OPENAI_BASE_URL", &openai.uri()),
    ]);

    let (status, body) = app
        .call(
            Method::POST,
            "/functions/chat-support",
            Some(json!({ "messages": [{"role": "user", "content": "How do I get more events?"}] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["reply"], "Upgrade under Billing.");

    // Limits are enforced before calling out
    let (status, _) = app
        .call(
            Method::POST,
            "/functions/chat-support",
            Some(json!({ "messages": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_functions_require_service_key() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/functions/firebase-sync")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
