//! # Key Directory
//!
//! The server-side directory mapping user ids to published public keys.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         KEY DIRECTORY                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  client                                      directory                  │
//! │  ──────                                      ─────────                  │
//! │                                                                         │
//! │  publish(pk)      PUT  /api/encryption/public-key          {publicKey} │
//! │  fetch_one(id)    GET  /api/encryption/public-key/:userId              │
//! │  fetch_batch(ids) POST /api/encryption/public-keys         {userIds}   │
//! │                                                                         │
//! │  Only public keys ever cross this boundary.                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The wire types live here so the client and the `murmur-directory`
//! service agree on one definition.

mod client;
mod memory;

pub use client::HttpKeyDirectory;
pub use memory::MemoryDirectory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::error::{Error, Result};

/// Maximum number of distinct user ids in one batch lookup
pub const MAX_BATCH_SIZE: usize = 50;

/// A user's published key as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyRecord {
    /// Directory user id
    pub user_id: String,
    /// Display username
    pub username: String,
    /// The user's current public key
    pub public_key: PublicKey,
}

/// Operations against the key directory
///
/// Implemented over HTTP by [`HttpKeyDirectory`] and in memory by
/// [`MemoryDirectory`].
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Publish the caller's public key, replacing any previous one
    async fn publish(&self, public_key: &PublicKey) -> Result<()>;

    /// Look up one user's public key
    async fn fetch_one(&self, user_id: &str) -> Result<PublicKeyRecord>;

    /// Look up many users at once, omitting users without a key
    async fn fetch_batch(&self, user_ids: &[String]) -> Result<HashMap<String, PublicKeyRecord>>;
}

/// Deduplicate ids preserving first occurrence, and enforce the batch limit
pub fn prepare_batch(user_ids: &[String]) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<String> = user_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    if unique.len() > MAX_BATCH_SIZE {
        return Err(Error::TooManyUsers {
            requested: unique.len(),
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(unique)
}

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Body of `PUT /api/encryption/public-key`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    /// Transport-encoded public key
    pub public_key: String,
}

/// Body of `POST /api/encryption/public-keys`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// Users to look up
    pub user_ids: Vec<String>,
}

/// One directory entry on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyEntry {
    /// Directory user id (numeric ids are accepted and stringified)
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    /// Display username
    #[serde(default)]
    pub username: String,
    /// Transport-encoded public key
    pub public_key: String,
}

impl TryFrom<PublicKeyEntry> for PublicKeyRecord {
    type Error = Error;

    fn try_from(entry: PublicKeyEntry) -> Result<Self> {
        Ok(Self {
            public_key: PublicKey::from_encoded(&entry.public_key)?,
            user_id: entry.user_id,
            username: entry.username,
        })
    }
}

impl From<&PublicKeyRecord> for PublicKeyEntry {
    fn from(record: &PublicKeyRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            username: record.username.clone(),
            public_key: record.public_key.to_encoded(),
        }
    }
}

/// `data` of a batch lookup response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    /// Users that have a key; keyless users are omitted
    pub public_keys: Vec<PublicKeyEntry>,
}

/// Success envelope: `{ success: true, data }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always true
    pub success: bool,
    /// Payload
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wrap a payload
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Error envelope: `{ success: false, error: { type, message } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Always false
    pub success: bool,
    /// Error detail
    pub error: ApiErrorDetail,
}

/// Machine-readable error type plus a human message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// One of the `error_types` constants
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable message
    pub message: String,
}

/// Error `type` strings used by the directory
pub mod error_types {
    /// Published key is missing or malformed
    pub const INVALID_PUBLIC_KEY: &str = "INVALID_PUBLIC_KEY";
    /// Looked-up user does not exist
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    /// Looked-up user has no key
    pub const NO_PUBLIC_KEY: &str = "NO_PUBLIC_KEY";
    /// Request body is malformed
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    /// Batch lookup over the limit
    pub const TOO_MANY_USERS: &str = "TOO_MANY_USERS";
    /// Missing or unknown bearer token
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    /// Unexpected server failure
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
