//! Serverless function endpoints (`POST /functions/<name>`)

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use inrooms_billing_core::CustomQuoteRequest;
use inrooms_sync::{BatchReport, FirebaseIdentity, SyncReport};
use inrooms_types::{CheckoutSession, DemoId, Plan, UserId};

use crate::error::{ApiError, ApiResult};
use crate::handlers::shared::{parse_uuid, timed};
use crate::state::AppState;
use crate::support::ChatMessage;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub user_id: String,
    pub plan: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeatureDemoCheckoutRequest {
    pub user_id: String,
    pub demo_id: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomQuoteBody {
    pub name: String,
    pub email: String,
    pub company: String,
    pub team_size: Option<i32>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CustomQuoteResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePaymentMethodRequest {
    pub user_id: String,
    pub payment_method_id: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FirebaseSyncRequest {
    /// Sync one user; omit to drain every pending user
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub user_id: UserId,
    pub firebase_uid: String,
    pub sync_version: i64,
    pub outcome: &'static str,
}

impl From<SyncReport> for SyncResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            user_id: report.user_id,
            firebase_uid: report.firebase_uid,
            sync_version: report.sync_version,
            outcome: report.outcome.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub attempted: usize,
    pub synced: usize,
    pub superseded: usize,
    pub failed: usize,
}

impl From<BatchReport> for BatchResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            attempted: report.attempted,
            synced: report.synced,
            superseded: report.superseded,
            failed: report.failed,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FirebaseSyncResponse {
    User(SyncResponse),
    Batch(BatchResponse),
}

#[derive(Debug, Deserialize)]
pub struct SyncUserRequest {
    pub firebase_uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncUserResponse {
    pub user_id: UserId,
    pub created: bool,
    pub sync: SyncResponse,
}

#[derive(Debug, Deserialize)]
pub struct ChatSupportRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatSupportResponse {
    pub reply: String,
}

// ============================================================================
// Billing functions
// ============================================================================

/// POST /functions/create-checkout-session
#[instrument(skip(state, req), fields(plan = %req.plan))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    timed("create_checkout_session", async {
        let user_id = UserId(parse_uuid(&req.user_id, "user_id")?);
        let plan: Plan = req
            .plan
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("Invalid plan: {}", req.plan)))?;

        let session = state
            .billing
            .create_subscription_checkout(
                user_id,
                plan,
                req.success_url.as_deref(),
                req.cancel_url.as_deref(),
            )
            .await?;
        Ok(Json(session))
    })
    .await
}

/// POST /functions/feature-demo
#[instrument(skip(state, req))]
pub async fn feature_demo_checkout(
    State(state): State<AppState>,
    Json(req): Json<FeatureDemoCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    timed("feature_demo_checkout", async {
        let user_id = UserId(parse_uuid(&req.user_id, "user_id")?);
        let demo_id = DemoId(parse_uuid(&req.demo_id, "demo_id")?);

        let session = state
            .billing
            .create_featured_demo_checkout(
                user_id,
                demo_id,
                req.success_url.as_deref(),
                req.cancel_url.as_deref(),
            )
            .await?;
        Ok(Json(session))
    })
    .await
}

/// POST /functions/custom-quote
pub async fn custom_quote(
    State(state): State<AppState>,
    Json(req): Json<CustomQuoteBody>,
) -> ApiResult<(StatusCode, Json<CustomQuoteResponse>)> {
    let quote = state
        .billing
        .submit_custom_quote(CustomQuoteRequest {
            name: req.name,
            email: req.email,
            company: req.company,
            team_size: req.team_size,
            message: req.message,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CustomQuoteResponse {
            id: quote.id.to_string(),
            status: quote.status,
        }),
    ))
}

/// POST /functions/delete-payment-method
#[instrument(skip(state, req))]
pub async fn delete_payment_method(
    State(state): State<AppState>,
    Json(req): Json<DeletePaymentMethodRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    timed("delete_payment_method", async {
        let user_id = UserId(parse_uuid(&req.user_id, "user_id")?);
        state
            .billing
            .delete_payment_method(user_id, req.payment_method_id.trim())
            .await?;
        Ok(Json(SuccessResponse { success: true }))
    })
    .await
}

// ============================================================================
// Sync functions
// ============================================================================

/// POST /functions/firebase-sync
///
/// Push one user's subscription state to Firestore, or drain the pending
/// queue when no user is named.
#[instrument(skip(state, body))]
pub async fn firebase_sync(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<FirebaseSyncResponse>> {
    timed("firebase_sync", async {
        let req: FirebaseSyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
            FirebaseSyncRequest::default()
        } else {
            serde_json::from_slice(&body)
                .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
        };

        let response = match req.user_id {
            Some(user_id) => {
                let user_id = UserId(parse_uuid(&user_id, "user_id")?);
                let report = state.sync.sync_user(user_id).await?;
                FirebaseSyncResponse::User(report.into())
            }
            None => {
                let report = state.sync.sync_pending().await?;
                FirebaseSyncResponse::Batch(report.into())
            }
        };
        Ok(Json(response))
    })
    .await
}

/// POST /functions/sync-user
///
/// Called by the client right after Firebase sign-in.
#[instrument(skip(state, req))]
pub async fn sync_user(
    State(state): State<AppState>,
    Json(req): Json<SyncUserRequest>,
) -> ApiResult<Json<SyncUserResponse>> {
    timed("sync_user", async {
        let linked = state
            .sync
            .upsert_from_identity(FirebaseIdentity {
                firebase_uid: req.firebase_uid,
                email: req.email,
                display_name: req.display_name,
            })
            .await?;

        Ok(Json(SyncUserResponse {
            user_id: linked.user.user_id(),
            created: linked.created,
            sync: linked.sync.into(),
        }))
    })
    .await
}

// ============================================================================
// Chat support
// ============================================================================

/// POST /functions/chat-support
pub async fn chat_support(
    State(state): State<AppState>,
    Json(req): Json<ChatSupportRequest>,
) -> ApiResult<Json<ChatSupportResponse>> {
    let Some(support) = &state.support else {
        return Err(ApiError::Unavailable("chat support is not configured".into()));
    };

    timed("chat_support", async {
        let reply = support.reply(&req.messages).await?;
        Ok(Json(ChatSupportResponse { reply }))
    })
    .await
}
