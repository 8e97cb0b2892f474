//! Service credential check for function and API routes

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Pull the token out of `Authorization: Bearer <token>`
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Reject requests that do not carry the service role key
pub async fn require_service_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.config.service_role_key.as_bytes();
    let authorized = bearer_token(&request)
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected)));

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "Rejected request without valid service key");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}
