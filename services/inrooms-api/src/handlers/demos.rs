//! Demo handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use inrooms_events_core::NewDemo;
use inrooms_types::{Demo, DemoId, DemoRegistration, RecordingVisibility, UserId};

use crate::error::ApiResult;
use crate::handlers::events::RegisterRequest;
use crate::handlers::shared::{parse_uuid, timed, validate_string_length};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDemoRequest {
    pub host_id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub max_participants: i32,
}

#[derive(Debug, Deserialize)]
pub struct UploadRecordingRequest {
    pub host_id: String,
    pub recording_url: String,
    pub visibility_days: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub demo: Demo,
    /// Days granted after clamping to the host's plan
    pub visibility_days: i64,
    pub requested_days: i64,
    pub visible_until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureDemoRequest {
    pub featured: bool,
    pub days: Option<i64>,
}

/// POST /api/v1/demos
pub async fn create_demo(
    State(state): State<AppState>,
    Json(req): Json<CreateDemoRequest>,
) -> ApiResult<(StatusCode, Json<Demo>)> {
    timed("create_demo", async {
        let host_id = UserId(parse_uuid(&req.host_id, "host_id")?);
        if let Some(description) = &req.description {
            validate_string_length(description, "description")?;
        }

        let demo = state
            .demos
            .create_demo(NewDemo {
                host_id,
                title: req.title,
                description: req.description,
                scheduled_at: req.scheduled_at,
                max_participants: req.max_participants,
            })
            .await?;

        Ok((StatusCode::CREATED, Json(demo)))
    })
    .await
}

/// GET /api/v1/demos/{id}
pub async fn get_demo(
    State(state): State<AppState>,
    Path(demo_id): Path<String>,
) -> ApiResult<Json<Demo>> {
    let demo_id = DemoId(parse_uuid(&demo_id, "demo_id")?);
    Ok(Json(state.demos.get_demo(demo_id).await?))
}

/// POST /api/v1/demos/{id}/registrations
#[instrument(skip(state, req))]
pub async fn register_for_demo(
    State(state): State<AppState>,
    Path(demo_id): Path<String>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<DemoRegistration>)> {
    timed("register_for_demo", async {
        let demo_id = DemoId(parse_uuid(&demo_id, "demo_id")?);
        let user_id = UserId(parse_uuid(&req.user_id, "user_id")?);

        let registration = state.demos.register_for_demo(user_id, demo_id).await?;
        Ok((StatusCode::CREATED, Json(registration)))
    })
    .await
}

/// DELETE /api/v1/demos/{id}/registrations/{user_id}
#[instrument(skip(state))]
pub async fn cancel_demo_registration(
    State(state): State<AppState>,
    Path((demo_id, user_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    timed("cancel_demo_registration", async {
        let demo_id = DemoId(parse_uuid(&demo_id, "demo_id")?);
        let user_id = UserId(parse_uuid(&user_id, "user_id")?);

        state
            .demos
            .cancel_demo_registration(user_id, demo_id)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    })
    .await
}

/// POST /api/v1/demos/{id}/recording
#[instrument(skip(state, req), fields(visibility_days = req.visibility_days))]
pub async fn upload_recording(
    State(state): State<AppState>,
    Path(demo_id): Path<String>,
    Json(req): Json<UploadRecordingRequest>,
) -> ApiResult<Json<RecordingResponse>> {
    timed("upload_recording", async {
        let demo_id = DemoId(parse_uuid(&demo_id, "demo_id")?);
        let host_id = UserId(parse_uuid(&req.host_id, "host_id")?);

        let upload = state
            .demos
            .upload_recording(host_id, demo_id, &req.recording_url, req.visibility_days)
            .await?;

        let RecordingVisibility {
            requested_days,
            granted_days,
            visible_until,
        } = upload.visibility;
        Ok(Json(RecordingResponse {
            demo: upload.demo,
            visibility_days: granted_days,
            requested_days,
            visible_until,
        }))
    })
    .await
}

/// POST /api/v1/demos/{id}/feature
///
/// Manual promotion by staff. Paid promotion goes through the
/// `feature-demo` function and the Stripe webhook.
#[instrument(skip(state, req), fields(featured = req.featured))]
pub async fn feature_demo(
    State(state): State<AppState>,
    Path(demo_id): Path<String>,
    Json(req): Json<FeatureDemoRequest>,
) -> ApiResult<Json<Demo>> {
    let demo_id = DemoId(parse_uuid(&demo_id, "demo_id")?);
    let demo = state
        .demos
        .set_featured(demo_id, req.featured, req.days)
        .await?;
    Ok(Json(demo))
}
