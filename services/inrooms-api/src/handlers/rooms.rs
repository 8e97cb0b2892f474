//! Room handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use inrooms_types::{Room, RoomId, RoomMembership, UserId};

use crate::error::ApiResult;
use crate::handlers::events::RegisterRequest;
use crate::handlers::shared::{parse_uuid, timed};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub host_id: String,
    pub name: String,
    pub max_participants: i32,
}

/// POST /api/v1/rooms
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    let host_id = UserId(parse_uuid(&req.host_id, "host_id")?);
    let room = state
        .rooms
        .create_room(host_id, &req.name, req.max_participants)
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/v1/rooms/{id}
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Room>> {
    let room_id = RoomId(parse_uuid(&room_id, "room_id")?);
    Ok(Json(state.rooms.get_room(room_id).await?))
}

/// POST /api/v1/rooms/{id}/participants
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RoomMembership>)> {
    timed("join_room", async {
        let room_id = RoomId(parse_uuid(&room_id, "room_id")?);
        let user_id = UserId(parse_uuid(&req.user_id, "user_id")?);

        let membership = state.rooms.join_room(user_id, room_id).await?;
        Ok((StatusCode::CREATED, Json(membership)))
    })
    .await
}

/// DELETE /api/v1/rooms/{id}/participants/{user_id}
pub async fn leave_room(
    State(state): State<AppState>,
    Path((room_id, user_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let room_id = RoomId(parse_uuid(&room_id, "room_id")?);
    let user_id = UserId(parse_uuid(&user_id, "user_id")?);

    state.rooms.leave_room(user_id, room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
