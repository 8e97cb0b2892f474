//! Event and user registration handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use inrooms_events_core::NewEvent;
use inrooms_types::{
    AdmissionCheck, Event, EventId, RegistrationReceipt, SubscriptionSnapshot, UserId,
};

use crate::error::ApiResult;
use crate::handlers::shared::{parse_uuid, timed, validate_string_length};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub host_id: String,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub max_attendees: i32,
}

#[derive(Debug, Deserialize)]
pub struct EligibilityQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationsResponse {
    pub event_ids: Vec<EventId>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/events
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    timed("create_event", async {
        let host_id = UserId(parse_uuid(&req.host_id, "host_id")?);
        if let Some(description) = &req.description {
            validate_string_length(description, "description")?;
        }

        let event = state
            .events
            .create_event(NewEvent {
                host_id,
                title: req.title,
                description: req.description,
                starts_at: req.starts_at,
                max_attendees: req.max_attendees,
            })
            .await?;

        Ok((StatusCode::CREATED, Json(event)))
    })
    .await
}

/// GET /api/v1/events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Event>> {
    let event_id = EventId(parse_uuid(&event_id, "event_id")?);
    Ok(Json(state.events.get_event(event_id).await?))
}

/// GET /api/v1/events/{id}/eligibility?user_id=
///
/// Advisory check that drives the register button.
#[instrument(skip(state, query))]
pub async fn check_eligibility(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(query): Query<EligibilityQuery>,
) -> ApiResult<Json<AdmissionCheck>> {
    timed("can_register_for_event", async {
        let event_id = EventId(parse_uuid(&event_id, "event_id")?);
        let user_id = UserId(parse_uuid(&query.user_id, "user_id")?);

        let check = state
            .events
            .can_register_for_event(user_id, event_id)
            .await?;
        Ok(Json(check))
    })
    .await
}

/// POST /api/v1/events/{id}/registrations
#[instrument(skip(state, req))]
pub async fn register_for_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegistrationReceipt>)> {
    timed("register_for_event", async {
        let event_id = EventId(parse_uuid(&event_id, "event_id")?);
        let user_id = UserId(parse_uuid(&req.user_id, "user_id")?);

        let receipt = state.events.register_for_event(user_id, event_id).await?;

        tracing::info!(
            user_id = %user_id,
            event_id = %event_id,
            events_used = receipt.events_used,
            "Registered for event"
        );
        Ok((StatusCode::CREATED, Json(receipt)))
    })
    .await
}

/// GET /api/v1/users/{id}/registrations
pub async fn get_user_registrations(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<RegistrationsResponse>> {
    let user_id = UserId(parse_uuid(&user_id, "user_id")?);
    let event_ids = state.events.get_user_registrations(user_id).await?;
    Ok(Json(RegistrationsResponse { event_ids }))
}

/// GET /api/v1/users/{id}/subscription
pub async fn get_user_subscription(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<SubscriptionSnapshot>> {
    let user_id = UserId(parse_uuid(&user_id, "user_id")?);
    Ok(Json(state.events.get_user_subscription(user_id).await?))
}
