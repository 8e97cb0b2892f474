//! Registration API through the full router

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use common::TestApp;
use inrooms_db::memory::MemoryStore;
use inrooms_types::{Plan, SubscriptionStatus, UserId};

fn add_user(app: &TestApp, status: SubscriptionStatus, used: i32, quota: i32) -> UserId {
    let row = MemoryStore::test_user(status, Plan::Professional, used, quota);
    let id = row.user_id();
    app.store.insert_user(row);
    id
}

async fn create_event(app: &TestApp, host: UserId, max_attendees: i32) -> String {
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/events",
            Some(json!({
                "host_id": host.to_string(),
                "title": "Founder mixer",
                "starts_at": (Utc::now() + Duration::days(3)).to_rfc3339(),
                "max_attendees": max_attendees
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn register(app: &TestApp, event_id: &str, user: UserId) -> (StatusCode, Value) {
    app.call(
        Method::POST,
        &format!("/api/v1/events/{event_id}/registrations"),
        Some(json!({ "user_id": user.to_string() })),
    )
    .await
}

#[tokio::test]
async fn test_health_routes_need_no_credentials() {
    let app = TestApp::new();
    for uri in ["/health", "/ready"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(body["status"].is_string());
    }
}

#[tokio::test]
async fn test_service_key_required() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let uri = format!("/api/v1/users/{host}/subscription");

    let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri(&uri)
        .header(header::AUTHORIZATION, "Bearer not-the-key")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["events_quota"], 15);
}

#[tokio::test]
async fn test_register_then_list() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let user = add_user(&app, SubscriptionStatus::Active, 1, 5);
    let event_id = create_event(&app, host, 10).await;

    let (status, check) = app
        .call(
            Method::GET,
            &format!("/api/v1/events/{event_id}/eligibility?user_id={user}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["success"], true);

    let (status, receipt) = register(&app, &event_id, user).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["events_used"], 2);
    assert_eq!(receipt["current_attendees"], 1);

    let (_, list) = app
        .call(Method::GET, &format!("/api/v1/users/{user}/registrations"), None)
        .await;
    assert_eq!(list["event_ids"], json!([event_id]));

    let (status, body) = register(&app, &event_id, user).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_REGISTERED");
    assert_eq!(app.store.user(user).unwrap().events_used, 2);
}

#[tokio::test]
async fn test_quota_exhausted() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let user = add_user(&app, SubscriptionStatus::Active, 5, 5);
    let event_id = create_event(&app, host, 10).await;

    let (_, check) = app
        .call(
            Method::GET,
            &format!("/api/v1/events/{event_id}/eligibility?user_id={user}"),
            None,
        )
        .await;
    assert_eq!(check["success"], false);
    assert!(check["message"].as_str().unwrap().contains("5 of 5"));

    let (status, body) = register(&app, &event_id, user).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
    assert_eq!(body["error"]["details"]["events_quota"], 5);
}

#[tokio::test]
async fn test_full_event() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let first = add_user(&app, SubscriptionStatus::Active, 0, 5);
    let second = add_user(&app, SubscriptionStatus::Active, 0, 5);
    let event_id = create_event(&app, host, 1).await;

    assert_eq!(register(&app, &event_id, first).await.0, StatusCode::CREATED);

    let (status, body) = register(&app, &event_id, second).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CAPACITY_REACHED");
    assert_eq!(app.store.user(second).unwrap().events_used, 0);
}

#[tokio::test]
async fn test_inactive_subscription() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let user = add_user(&app, SubscriptionStatus::Canceled, 0, 5);
    let event_id = create_event(&app, host, 10).await;

    let (status, body) = register(&app, &event_id, user).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "SUBSCRIPTION_INACTIVE");
}

#[tokio::test]
async fn test_bad_ids_and_missing_rows() {
    let app = TestApp::new();
    let user = add_user(&app, SubscriptionStatus::Active, 0, 5);

    let (status, body) = register(&app, "not-a-uuid", user).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let missing = uuid::Uuid::new_v4();
    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/events/{missing}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "EVENT_NOT_FOUND");
}

#[tokio::test]
async fn test_demo_recording_is_clamped_for_trial_host() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Trial, 0, 3);
    let stranger = add_user(&app, SubscriptionStatus::Active, 0, 15);

    let (status, demo) = app
        .call(
            Method::POST,
            "/api/v1/demos",
            Some(json!({
                "host_id": host.to_string(),
                "title": "Product walkthrough",
                "scheduled_at": Utc::now().to_rfc3339(),
                "max_participants": 20
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let demo_id = demo["id"].as_str().unwrap();
    let uri = format!("/api/v1/demos/{demo_id}/recording");

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({
                "host_id": host.to_string(),
                "recording_url": "https://cdn.inrooms.io/rec/1.mp4",
                "visibility_days": 100
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["visibility_days"], 7);
    assert_eq!(body["requested_days"], 100);
    assert_eq!(body["demo"]["recording_url"], "https://cdn.inrooms.io/rec/1.mp4");

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({
                "host_id": stranger.to_string(),
                "recording_url": "https://cdn.inrooms.io/rec/2.mp4",
                "visibility_days": 10
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_demo_registration_and_cancel() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let user = add_user(&app, SubscriptionStatus::Active, 0, 5);

    let (_, demo) = app
        .call(
            Method::POST,
            "/api/v1/demos",
            Some(json!({
                "host_id": host.to_string(),
                "title": "Live demo",
                "scheduled_at": Utc::now().to_rfc3339(),
                "max_participants": 5
            })),
        )
        .await;
    let demo_id = demo["id"].as_str().unwrap();

    let (status, reg) = app
        .call(
            Method::POST,
            &format!("/api/v1/demos/{demo_id}/registrations"),
            Some(json!({ "user_id": user.to_string() })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reg["current_participants"], 1);
    assert_eq!(reg["events_used"], 1);

    let cancel = format!("/api/v1/demos/{demo_id}/registrations/{user}");
    let (status, _) = app.call(Method::DELETE, &cancel, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, demo) = app
        .call(Method::GET, &format!("/api/v1/demos/{demo_id}"), None)
        .await;
    assert_eq!(demo["current_participants"], 0);
    // Quota is not refunded
    assert_eq!(app.store.user(user).unwrap().events_used, 1);

    let (status, body) = app.call(Method::DELETE, &cancel, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_REGISTERED");
}

#[tokio::test]
async fn test_manual_feature_flag() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let (_, demo) = app
        .call(
            Method::POST,
            "/api/v1/demos",
            Some(json!({
                "host_id": host.to_string(),
                "title": "Featured",
                "scheduled_at": Utc::now().to_rfc3339(),
                "max_participants": 5
            })),
        )
        .await;
    let uri = format!("/api/v1/demos/{}/feature", demo["id"].as_str().unwrap());

    let (status, body) = app
        .call(Method::POST, &uri, Some(json!({ "featured": true, "days": 7 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_featured"], true);
    assert!(body["featured_until"].is_string());

    let (status, _) = app
        .call(Method::POST, &uri, Some(json!({ "featured": true, "days": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "featured": true, "days": 1_000_000_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_room_join_and_leave() {
    let app = TestApp::new();
    let host = add_user(&app, SubscriptionStatus::Active, 0, 15);
    let guest = add_user(&app, SubscriptionStatus::Active, 5, 5);
    let other = add_user(&app, SubscriptionStatus::Active, 0, 5);

    let (status, room) = app
        .call(
            Method::POST,
            "/api/v1/rooms",
            Some(json!({ "host_id": host.to_string(), "name": "Hallway", "max_participants": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let room_id = room["id"].as_str().unwrap();
    let join = format!("/api/v1/rooms/{room_id}/participants");

    // Rooms do not consume quota, so an exhausted user can still join
    let (status, membership) = app
        .call(Method::POST, &join, Some(json!({ "user_id": guest.to_string() })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(membership["current_participants"], 1);

    let (status, body) = app
        .call(Method::POST, &join, Some(json!({ "user_id": other.to_string() })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CAPACITY_REACHED");

    let (status, _) = app
        .call(Method::DELETE, &format!("{join}/{guest}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, room) = app
        .call(Method::GET, &format!("/api/v1/rooms/{room_id}"), None)
        .await;
    assert_eq!(room["current_participants"], 0);
}
