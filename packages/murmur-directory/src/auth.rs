//! Bearer token authentication.
//!
//! Tokens are issued out of band and loaded from a JSON file mapping each
//! token to the identity it authenticates:
//!
//! ```json
//! { "tok-alice": { "userId": "1", "username": "alice" } }
//! ```
//!
//! An authenticated caller is registered in the directory on first use, so
//! lookups of a known user without a key answer `NO_PUBLIC_KEY` rather than
//! `USER_NOT_FOUND`.

use std::collections::HashMap;
use std::path::Path;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Identity bound to a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIdentity {
    pub user_id: String,
    pub username: String,
}

/// token → identity
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: DashMap<String, TokenIdentity>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tokens from a JSON file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read tokens file {}: {}", path.display(), e))?;
        let entries: HashMap<String, TokenIdentity> = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse tokens file {}: {}", path.display(), e))?;

        let registry = Self::new();
        for (token, identity) in entries {
            registry.tokens.insert(token, identity);
        }
        Ok(registry)
    }

    /// Bind `token` to a user.
    pub fn insert(&self, token: &str, user_id: &str, username: &str) {
        self.tokens.insert(
            token.to_string(),
            TokenIdentity {
                user_id: user_id.to_string(),
                username: username.to_string(),
            },
        );
    }

    pub fn resolve(&self, token: &str) -> Option<TokenIdentity> {
        self.tokens.get(token).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let identity = state.tokens.resolve(token).ok_or_else(|| {
            tracing::debug!("Rejected unknown bearer token");
            ApiError::Unauthorized
        })?;

        state.store.ensure_user(&identity.user_id, &identity.username);

        Ok(AuthUser {
            user_id: identity.user_id,
            username: identity.username,
        })
    }
}
