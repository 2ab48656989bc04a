//! HTTP API handlers for the key directory.
//!
//! All `/api` routes require `Authorization: Bearer <token>`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use murmur_core::crypto::normalize_key;
use murmur_core::directory::{
    ApiResponse, BatchRequest, BatchResponse, PublicKeyEntry, PublishRequest, MAX_BATCH_SIZE,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// PUT /api/encryption/public-key
///
/// Replace the caller's public key. The key is stored in canonical encoding.
pub async fn publish_key(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<PublicKeyEntry>>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidPublicKey(e.body_text()))?;

    let public_key =
        normalize_key(&request.public_key).map_err(|e| ApiError::InvalidPublicKey(e.to_string()))?;

    let record = state
        .store
        .set_public_key(&user.user_id, &user.username, public_key);

    tracing::info!(user_id = user.user_id.as_str(), "Public key published");

    let entry = record
        .to_entry()
        .ok_or_else(|| ApiError::InvalidPublicKey("public key was not stored".into()))?;
    Ok(Json(ApiResponse::ok(entry)))
}

/// GET /api/encryption/public-key/:user_id
pub async fn get_key(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<PublicKeyEntry>>, ApiError> {
    let record = state
        .store
        .get(&user_id)
        .ok_or_else(|| ApiError::UserNotFound(user_id.clone()))?;

    let entry = record.to_entry().ok_or(ApiError::NoPublicKey(user_id))?;
    Ok(Json(ApiResponse::ok(entry)))
}

/// POST /api/encryption/public-keys
///
/// Users without a key, and unknown users, are omitted from the result.
pub async fn batch_keys(
    State(state): State<AppState>,
    _user: AuthUser,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BatchResponse>>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

    if request.user_ids.is_empty() {
        return Err(ApiError::InvalidRequest("userIds must be a non-empty array".into()));
    }
    if request.user_ids.len() > MAX_BATCH_SIZE {
        return Err(ApiError::TooManyUsers {
            requested: request.user_ids.len(),
            max: MAX_BATCH_SIZE,
        });
    }

    let public_keys = state.store.batch(&request.user_ids);
    tracing::debug!(
        requested = request.user_ids.len(),
        found = public_keys.len(),
        "Batch key lookup"
    );

    Ok(Json(ApiResponse::ok(BatchResponse { public_keys })))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "murmur-directory",
        "version": env!("CARGO_PKG_VERSION"),
        "users": state.store.user_count(),
        "keys": state.store.key_count(),
    }))
}
