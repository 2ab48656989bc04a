//! # Key Derivation Functions
//!
//! Password-based key derivation for key backups, and public key
//! fingerprints for logs.
//!
//! ## Backup Key Derivation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    BACKUP KEY DERIVATION                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    USER PASSWORD                                │   │
//! │  │                                                                 │   │
//! │  │  Entered when exporting and again when restoring               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  PBKDF2-HMAC-SHA256(                                           │   │
//! │  │    password = UTF-8 bytes,                                     │   │
//! │  │    salt = 16 random bytes (stored in the backup),              │   │
//! │  │    iterations = 100,000,                                       │   │
//! │  │    output_length = 32 bytes                                    │   │
//! │  │  )                                                             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    AES-256-GCM KEY                              │   │
//! │  │                                                                 │   │
//! │  │  Encrypts the key pair JSON inside the backup blob             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The parameters match the backups produced by the web client, so a file
//! exported there restores here and the other way around.

use hmac::Hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// PBKDF2 iteration count for backup keys
pub const BACKUP_KDF_ITERATIONS: u32 = 100_000;

/// Size of the random backup salt in bytes
pub const BACKUP_SALT_SIZE: usize = 16;

/// Size of the derived backup key in bytes (AES-256)
pub const BACKUP_KEY_SIZE: usize = 32;

/// Derive the AES-256-GCM key protecting a backup
///
/// Deterministic for a given (password, salt). CPU-bound: callers on an
/// async runtime should run this on the blocking pool.
pub fn derive_backup_key(
    password: &str,
    salt: &[u8],
) -> Result<Zeroizing<[u8; BACKUP_KEY_SIZE]>> {
    let mut key = Zeroizing::new([0u8; BACKUP_KEY_SIZE]);

    pbkdf2::pbkdf2::<Hmac<Sha256>>(
        password.as_bytes(),
        salt,
        BACKUP_KDF_ITERATIONS,
        &mut key[..],
    )
    .map_err(|e| Error::KeyDerivationFailed(format!("PBKDF2 failed: {}", e)))?;

    Ok(key)
}

/// Compute a short fingerprint of a public key
///
/// Hex of the first 8 bytes of SHA-256(key). Used wherever a key needs to
/// be identified in logs without printing it.
pub fn key_fingerprint(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    hex::encode(&digest[..8])
}

// ============================================================================
// TESTS
// ============================================================================
