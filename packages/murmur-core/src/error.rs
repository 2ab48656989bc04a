//! # Error Handling
//!
//! This module provides the error taxonomy for Murmur Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key Errors                                                        │
//! │  │   ├── NoActiveKeyPair       - No key pair generated or restored     │
//! │  │   ├── NoKeysToExport        - Backup requested without a key pair   │
//! │  │   ├── InvalidKeyFormat      - Key text cannot be decoded            │
//! │  │   ├── KeyDerivationFailed   - Backup KDF failed or timed out        │
//! │  │   └── RngFailed             - OS entropy source failed              │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── EncryptionFailed      - Seal operation failed                 │
//! │  │   ├── DecryptionFailed      - No candidate key opened the envelope  │
//! │  │   └── RestoreFailed         - Wrong password or corrupted backup    │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageReadError      - Failed to read a key slot             │
//! │  │   ├── StorageWriteError     - Failed to write key slots             │
//! │  │   ├── StorageCorrupted      - Slot content does not parse           │
//! │  │   └── DatabaseError         - SQLite failure                        │
//! │  │                                                                      │
//! │  └── Directory Errors                                                  │
//! │      ├── NetworkError          - Transport failure (retryable)         │
//! │      ├── UserNotFound          - Looked-up user does not exist         │
//! │      ├── NoPublicKeySet        - User exists but never published       │
//! │      ├── TooManyUsers          - Batch lookup over the server limit    │
//! │      └── ProtocolError         - Unexpected directory response         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure mode is a distinct variant so UI code can tell "wrong
//! password" from "no internet" without string matching.

use thiserror::Error;

/// Result type alias for Murmur Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Murmur Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Key Errors (100-199)
    // ========================================================================

    /// No active key pair in the key store
    #[error("No active key pair. Generate or restore keys first.")]
    NoActiveKeyPair,

    /// Backup export requested while the key store is empty
    #[error("No keys to export.")]
    NoKeysToExport,

    /// A key string could not be normalized or decoded
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Password key derivation failed
    #[error("Failed to derive keys: {0}")]
    KeyDerivationFailed(String),

    /// Random number generation failed
    #[error("Random number generation failed")]
    RngFailed,

    // ========================================================================
    // Crypto Errors (200-299)
    // ========================================================================

    /// Sealing an envelope failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Every candidate key failed to open the envelope
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Backup could not be restored.
    ///
    /// Wrong password and corrupted file are deliberately reported the same.
    #[error("Failed to decrypt backup. Wrong password or corrupted file.")]
    RestoreFailed,

    // ========================================================================
    // Storage Errors (300-399)
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Stored data does not parse
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    // ========================================================================
    // Directory Errors (400-499)
    // ========================================================================

    /// Transport failure talking to the key directory
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The looked-up user does not exist
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The looked-up user has not published a public key
    #[error("User {0} has not set up end-to-end encryption")]
    NoPublicKeySet(String),

    /// Batch lookup exceeded the directory limit
    #[error("Too many users in one lookup: {requested} (maximum {max})")]
    TooManyUsers {
        /// Number of distinct ids requested
        requested: usize,
        /// Server-enforced maximum
        max: usize,
    },

    /// The directory answered with something we do not understand
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Keys
    /// - 200-299: Crypto
    /// - 300-399: Storage
    /// - 400-499: Key directory
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Keys (100-199)
            Error::NoActiveKeyPair => 100,
            Error::NoKeysToExport => 101,
            Error::InvalidKeyFormat(_) => 102,
            Error::KeyDerivationFailed(_) => 103,
            Error::RngFailed => 104,

            // Crypto (200-299)
            Error::EncryptionFailed(_) => 200,
            Error::DecryptionFailed(_) => 201,
            Error::RestoreFailed => 202,

            // Storage (300-399)
            Error::StorageReadError(_) => 300,
            Error::StorageWriteError(_) => 301,
            Error::StorageCorrupted(_) => 302,
            Error::DatabaseError(_) => 303,

            // Directory (400-499)
            Error::NetworkError(_) => 400,
            Error::UserNotFound(_) => 401,
            Error::NoPublicKeySet(_) => 402,
            Error::TooManyUsers { .. } => 403,
            Error::ProtocolError(_) => 404,

            // Internal (900-999)
            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
        }
    }

    /// Check if this error is recoverable by retrying the same call
    ///
    /// Directory operations are idempotent, so transport failures are safe
    /// to retry. Cryptographic failures never are.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::NetworkError(_))
    }

    /// Check if this error requires user action
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Error::NoActiveKeyPair
                | Error::NoKeysToExport
                | Error::RestoreFailed
                | Error::NoPublicKeySet(_)
                | Error::TooManyUsers { .. }
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::ProtocolError(err.to_string())
        } else {
            Error::NetworkError(err.to_string())
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
