//! # Key Backup
//!
//! Password-protected export and import of the active key pair.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         BACKUP FORMAT                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  export(password)                                                      │
//! │                                                                         │
//! │    salt  = 16 random bytes                                             │
//! │    key   = PBKDF2-HMAC-SHA256(password, salt, 100,000) → 32 bytes      │
//! │    iv    = 12 random bytes                                             │
//! │    data  = AES-256-GCM(key, iv, {"publicKey","secretKey"} JSON)        │
//! │                                                                         │
//! │  file:  { "salt": "<base64>", "iv": "<base64>", "data": "<base64>" }   │
//! │                                                                         │
//! │  import(blob, password)                                                │
//! │                                                                         │
//! │    any failure (bad password, bad file, mismatched halves)             │
//! │        → RestoreFailed, cause not disclosed                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither direction touches persistent state: the caller decides whether
//! an imported pair becomes active.

use std::sync::Arc;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::encoding::base64_bytes;
use crate::crypto::{derive_backup_key, KeyPair, BACKUP_SALT_SIZE};
use crate::error::{Error, Result};
use crate::keystore::KeyStore;

/// Size of the AES-GCM IV in bytes (96 bits)
pub const BACKUP_IV_SIZE: usize = 12;

/// An encrypted key backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupBlob {
    /// PBKDF2 salt
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    /// AES-GCM IV
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    /// AES-GCM ciphertext of the key pair JSON
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl BackupBlob {
    /// Serialize to the backup file format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse the backup file format
    ///
    /// Any parse failure is reported as `RestoreFailed`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            tracing::debug!(error = %e, "Backup file did not parse");
            Error::RestoreFailed
        })
    }
}

/// Seals the active key pair into a [`BackupBlob`] and opens blobs back
/// into key pairs
#[derive(Clone)]
pub struct BackupCodec {
    keystore: Arc<KeyStore>,
}

impl BackupCodec {
    /// Create a codec that exports from `keystore`
    pub fn new(keystore: Arc<KeyStore>) -> Self {
        Self { keystore }
    }

    /// Export the active key pair under `password`
    pub fn export(&self, password: &str) -> Result<BackupBlob> {
        let pair = self.keystore.load()?.ok_or(Error::NoKeysToExport)?;
        seal_pair(&pair, password)
    }

    /// Recover the key pair inside `blob`
    pub fn import(&self, blob: &BackupBlob, password: &str) -> Result<KeyPair> {
        open_pair(blob, password)
    }
}

/// Encrypt `pair` under `password`
pub fn seal_pair(pair: &KeyPair, password: &str) -> Result<BackupBlob> {
    let mut salt = vec![0u8; BACKUP_SALT_SIZE];
    let mut iv = vec![0u8; BACKUP_IV_SIZE];
    OsRng
        .try_fill_bytes(&mut salt)
        .and_then(|_| OsRng.try_fill_bytes(&mut iv))
        .map_err(|_| Error::RngFailed)?;

    let key = derive_backup_key(password, &salt)?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key[..]));

    let plaintext = Zeroizing::new(serde_json::to_vec(pair)?);
    let data = cipher
        .encrypt(GenericArray::from_slice(&iv), plaintext.as_slice())
        .map_err(|e| Error::EncryptionFailed(format!("Backup encryption failed: {}", e)))?;

    tracing::info!(
        fingerprint = %pair.public_key().fingerprint(),
        "Exported key backup"
    );
    Ok(BackupBlob { salt, iv, data })
}

/// Decrypt the key pair inside `blob`
///
/// Every failure is `RestoreFailed`.
pub fn open_pair(blob: &BackupBlob, password: &str) -> Result<KeyPair> {
    if blob.iv.len() != BACKUP_IV_SIZE || blob.salt.is_empty() {
        tracing::debug!(iv_len = blob.iv.len(), "Backup blob has malformed parameters");
        return Err(Error::RestoreFailed);
    }

    let key = derive_backup_key(password, &blob.salt).map_err(|_| Error::RestoreFailed)?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key[..]));

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(&blob.iv), blob.data.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| Error::RestoreFailed)?;

    // Parsing goes through KeyPair::from_parts, which rejects halves that
    // do not belong together
    let pair: KeyPair = serde_json::from_slice(&plaintext).map_err(|e| {
        tracing::debug!(error = %e, "Decrypted backup payload is not a key pair");
        Error::RestoreFailed
    })?;

    tracing::info!(
        fingerprint = %pair.public_key().fingerprint(),
        "Imported key backup"
    );
    Ok(pair)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encoding;
    use crate::storage::MemoryStore;

    fn codec_with_pair() -> (BackupCodec, KeyPair) {
        let keystore = Arc::new(KeyStore::new(Arc::new(MemoryStore::new())));
        let pair = KeyPair::generate().unwrap();
        keystore.store(&pair).unwrap();
        (BackupCodec::new(keystore), pair)
    }

    #[test]
    fn test_export_import_round_trip() {
        let (codec, pair) = codec_with_pair();

        let blob = codec.export("hunter2").unwrap();
        assert_eq!(blob.salt.len(), BACKUP_SALT_SIZE);
        assert_eq!(blob.iv.len(), BACKUP_IV_SIZE);

        let json = blob.to_json().unwrap();
        let restored = codec.import(&BackupBlob::from_json(&json).unwrap(), "hunter2").unwrap();
        assert_eq!(restored, pair);
    }

    #[test]
    fn test_wrong_password_fails() {
        let (codec, _) = codec_with_pair();
        let blob = codec.export("right").unwrap();

        assert!(matches!(codec.import(&blob, "wrong"), Err(Error::RestoreFailed)));
    }

    #[test]
    fn test_export_without_keys() {
        let keystore = Arc::new(KeyStore::new(Arc::new(MemoryStore::new())));
        let codec = BackupCodec::new(keystore);

        assert!(matches!(codec.export("pw"), Err(Error::NoKeysToExport)));
    }

    #[test]
    fn test_each_export_is_freshly_salted() {
        let (codec, _) = codec_with_pair();
        let b1 = codec.export("pw").unwrap();
        let b2 = codec.export("pw").unwrap();

        assert_ne!(b1.salt, b2.salt);
        assert_ne!(b1.iv, b2.iv);
        assert_ne!(b1.data, b2.data);
    }

    #[test]
    fn test_corrupted_blob_fails() {
        let (codec, _) = codec_with_pair();
        let mut blob = codec.export("pw").unwrap();
        blob.data[0] ^= 0x01;

        assert!(matches!(codec.import(&blob, "pw"), Err(Error::RestoreFailed)));
        assert!(matches!(BackupBlob::from_json("{\"salt\":\"AA==\"}"), Err(Error::RestoreFailed)));
    }

    #[test]
    fn test_mismatched_halves_fail() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();
        let payload = format!(
            r#"{{"publicKey":"{}","secretKey":"{}"}}"#,
            a.public_key().to_encoded(),
            b.private_key().to_encoded().as_str()
        );

        let salt = vec![1u8; BACKUP_SALT_SIZE];
        let iv = vec![2u8; BACKUP_IV_SIZE];
        let key = derive_backup_key("pw", &salt).unwrap();
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key[..]));
        let data = cipher
            .encrypt(GenericArray::from_slice(&iv), payload.as_bytes())
            .unwrap();

        let blob = BackupBlob { salt, iv, data };
        assert!(matches!(open_pair(&blob, "pw"), Err(Error::RestoreFailed)));
    }

    #[test]
    fn test_blob_fields_are_base64() {
        let (codec, _) = codec_with_pair();
        let json = codec.export("pw").unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        for field in ["salt", "iv", "data"] {
            let text = value[field].as_str().unwrap();
            assert!(encoding::decode(text).is_ok());
        }
    }
}
