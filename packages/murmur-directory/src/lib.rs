//! Murmur Key Directory
//!
//! A small HTTP service mapping user ids to their current public encryption
//! key:
//!
//! ```text
//! PUT  /api/encryption/public-key          publish the caller's key
//! GET  /api/encryption/public-key/:userId  look up one user
//! POST /api/encryption/public-keys         look up up to 50 users
//! GET  /health
//! ```
//!
//! **Privacy**: the directory only ever holds public keys. Private keys and
//! plaintext never reach it.

pub mod api;
pub mod auth;
pub mod error;
pub mod state;
pub mod store;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use auth::{AuthUser, TokenRegistry};
pub use error::ApiError;
pub use state::{AppState, DirectoryConfig};
pub use store::{DirectoryRecord, DirectoryStore};

/// Build the directory router over `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/api/encryption/public-key", put(api::publish_key))
        .route("/api/encryption/public-key/:user_id", get(api::get_key))
        .route("/api/encryption/public-keys", post(api::batch_keys))
        .route("/health", get(api::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
