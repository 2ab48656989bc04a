//! API errors and their JSON rendering.
//!
//! Every failure leaves the server as
//! `{ "success": false, "error": { "type": ..., "message": ... } }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use murmur_core::directory::{error_types, ApiErrorDetail, ApiErrorResponse};

/// Errors returned by directory handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("User {0} has not set a public key")]
    NoPublicKey(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Too many users requested: {requested} (max {max})")]
    TooManyUsers { requested: usize, max: usize },

    #[error("Missing or invalid bearer token")]
    Unauthorized,
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidPublicKey(_) | ApiError::InvalidRequest(_) | ApiError::TooManyUsers { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UserNotFound(_) | ApiError::NoPublicKey(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable `type` string.
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::InvalidPublicKey(_) => error_types::INVALID_PUBLIC_KEY,
            ApiError::UserNotFound(_) => error_types::USER_NOT_FOUND,
            ApiError::NoPublicKey(_) => error_types::NO_PUBLIC_KEY,
            ApiError::InvalidRequest(_) => error_types::INVALID_REQUEST,
            ApiError::TooManyUsers { .. } => error_types::TOO_MANY_USERS,
            ApiError::Unauthorized => error_types::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            success: false,
            error: ApiErrorDetail {
                error_type: self.error_type().to_string(),
                message: self.to_string(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}
