//! # Key Management
//!
//! Curve25519 key pairs for the envelope box, and the provider that mints
//! them.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyPair (X25519)                                               │   │
//! │  │  ────────────────                                                │   │
//! │  │                                                                  │   │
//! │  │  Purpose:                                                       │   │
//! │  │  • Sealing envelopes to a recipient's public key                │   │
//! │  │  • Opening envelopes sealed to our public key                   │   │
//! │  │                                                                  │   │
//! │  │  Format:                                                        │   │
//! │  │  • Private key: 32 bytes (client only, zeroized on drop)       │   │
//! │  │  • Public key: 32 bytes (published to the key directory)       │   │
//! │  │                                                                  │   │
//! │  │  JSON (key store slots, backup payload):                        │   │
//! │  │  { "publicKey": "<base64>", "secretKey": "<base64>" }           │   │
//! │  │                                                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::encoding::{self, KEY_SIZE};
use super::kdf::key_fingerprint;
use crate::error::{Error, Result};

// ============================================================================
// PUBLIC KEY
// ============================================================================

/// A Curve25519 public key
///
/// Safe to share. Displays as canonical base64; `Debug` shows only the
/// fingerprint to keep logs short.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Decode from either base64 alphabet
    pub fn from_encoded(text: &str) -> Result<Self> {
        encoding::decode_key(text).map(Self)
    }

    /// Canonical transport encoding
    pub fn to_encoded(&self) -> String {
        encoding::encode(&self.0)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Short hex fingerprint for logs and UI
    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.0)
    }

    pub(crate) fn to_box_key(self) -> crypto_box::PublicKey {
        crypto_box::PublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_encoded())
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_encoded(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_encoded())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_encoded(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// PRIVATE KEY
// ============================================================================

/// A Curve25519 private key
///
/// ## Security
///
/// - Zeroized when dropped
/// - `Debug` never prints key material
/// - Never serialized on its own; only as part of a [`KeyPair`] written to
///   the local key store or sealed inside a backup
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; KEY_SIZE]);

impl PrivateKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Decode from either base64 alphabet
    pub fn from_encoded(text: &str) -> Result<Self> {
        let bytes = Zeroizing::new(encoding::decode_key(text)?);
        Ok(Self(*bytes))
    }

    /// Canonical transport encoding
    ///
    /// ## Security Warning
    ///
    /// Only for local persistence and backup payloads. Never log or transmit.
    pub fn to_encoded(&self) -> Zeroizing<String> {
        Zeroizing::new(encoding::encode(&self.0))
    }

    /// Compute the matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.to_box_key().public_key().as_bytes())
    }

    pub(crate) fn to_box_key(&self) -> crypto_box::SecretKey {
        crypto_box::SecretKey::from(self.0)
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time: no early exit on the first differing byte
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

// ============================================================================
// KEY PAIR
// ============================================================================

/// A Curve25519 key pair
///
/// The two halves are always mathematically paired: constructors either
/// derive the public key or check it against the private key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyPairRecord", into = "KeyPairRecord")]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    /// Generate a new random key pair from the OS entropy source
    pub fn generate() -> Result<Self> {
        OsKeyPairProvider.generate()
    }

    /// Build a key pair from its private half
    pub fn from_private(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    /// Build a key pair from both halves, checking that they match
    pub fn from_parts(public: PublicKey, private: PrivateKey) -> Result<Self> {
        if private.public_key() != public {
            return Err(Error::InvalidKeyFormat(
                "public key does not match private key".into(),
            ));
        }
        Ok(Self { public, private })
    }

    /// Build a key pair from transport-encoded halves
    pub fn from_encoded(public_key: &str, private_key: &str) -> Result<Self> {
        Self::from_parts(
            PublicKey::from_encoded(public_key)?,
            PrivateKey::from_encoded(private_key)?,
        )
    }

    /// The public half
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The private half
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("private", &self.private)
            .finish()
    }
}

/// Serialized form of a [`KeyPair`]
///
/// Field names match the backups written by the web client, which calls
/// the private half `secretKey`.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct KeyPairRecord {
    #[serde(rename = "publicKey")]
    public_key: String,
    #[serde(rename = "secretKey", alias = "privateKey")]
    secret_key: String,
}

impl TryFrom<KeyPairRecord> for KeyPair {
    type Error = Error;

    fn try_from(record: KeyPairRecord) -> Result<Self> {
        KeyPair::from_encoded(&record.public_key, &record.secret_key)
    }
}

impl From<KeyPair> for KeyPairRecord {
    fn from(pair: KeyPair) -> Self {
        Self {
            public_key: pair.public.to_encoded(),
            secret_key: pair.private.to_encoded().to_string(),
        }
    }
}

// ============================================================================
// KEY PAIR PROVIDER
// ============================================================================

/// Source of fresh key pairs
///
/// Injected into [`crate::E2eService`] so tests can control key material.
pub trait KeyPairProvider: Send + Sync {
    /// Generate a uniformly random key pair
    fn generate(&self) -> Result<KeyPair>;
}

/// Key pair provider backed by the operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsKeyPairProvider;

impl KeyPairProvider for OsKeyPairProvider {
    fn generate(&self) -> Result<KeyPair> {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        OsRng
            .try_fill_bytes(&mut bytes[..])
            .map_err(|_| Error::RngFailed)?;

        Ok(KeyPair::from_private(PrivateKey::from_bytes(*bytes)))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp1 = KeyPair::generate().unwrap();
        let kp2 = KeyPair::generate().unwrap();

        assert_ne!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.private_key().public_key(), *kp1.public_key());
    }

    #[test]
    fn test_from_parts_rejects_mismatched_halves() {
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();

        let result = KeyPair::from_parts(*a.public_key(), b.private_key().clone());
        assert!(matches!(result, Err(Error::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_keypair_json_round_trip() {
        let kp = KeyPair::generate().unwrap();

        let json = serde_json::to_string(&kp).unwrap();
        assert!(json.contains("\"publicKey\""));
        assert!(json.contains("\"secretKey\""));

        let restored: KeyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(kp, restored);
    }

    #[test]
    fn test_keypair_json_accepts_private_key_alias() {
        let kp = KeyPair::generate().unwrap();
        let json = format!(
            r#"{{"publicKey":"{}","privateKey":"{}"}}"#,
            kp.public_key().to_encoded(),
            kp.private_key().to_encoded().as_str()
        );

        let restored: KeyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(kp, restored);
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let kp = KeyPair::generate().unwrap();
        let debug = format!("{:?}", kp);
        let secret = kp.private_key().to_encoded();

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(secret.as_str()));
    }

    #[test]
    fn test_public_key_from_str() {
        let kp = KeyPair::generate().unwrap();
        let encoded = kp.public_key().to_string();
        let parsed: PublicKey = encoded.parse().unwrap();
        assert_eq!(parsed, *kp.public_key());
    }
}
