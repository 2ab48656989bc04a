//! # Envelope Codec
//!
//! Wire form of sealed messages.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ENVELOPE WIRE FORMAT                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Envelope (single recipient)                                           │
//! │  {                                                                      │
//! │    "ciphertext": "<base64 box output, 16-byte tag included>",          │
//! │    "nonce":      "<base64, 24 bytes>"                                   │
//! │  }                                                                      │
//! │                                                                         │
//! │  DualEnvelope (recipient + owner copy, flattened)                      │
//! │  {                                                                      │
//! │    "ciphertext":      "...",   "nonce":      "...",   ← recipient      │
//! │    "ciphertextOwner": "...",   "nonceOwner": "..."    ← sender's copy  │
//! │  }                                                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding accepts either base64 alphabet. A malformed envelope can never
//! be opened, so decode failures are reported as `DecryptionFailed`.

use serde::{Deserialize, Serialize};

use crate::crypto::encoding::{self, base64_array, base64_bytes};
use crate::error::{Error, Result};

/// Size of the box nonce in bytes (192 bits)
pub const NONCE_SIZE: usize = 24;

/// A sealed message: ciphertext plus the nonce it was sealed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Box output, authentication tag included
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    /// Random nonce, fresh per seal
    #[serde(with = "base64_array")]
    pub nonce: [u8; NONCE_SIZE],
}

impl Envelope {
    /// Build an envelope from its two transport-encoded fields
    pub fn from_encoded(ciphertext: &str, nonce: &str) -> Result<Self> {
        let ciphertext = encoding::decode(ciphertext)
            .map_err(|e| Error::DecryptionFailed(format!("malformed ciphertext: {}", e)))?;
        let nonce = encoding::decode(nonce)
            .map_err(|e| Error::DecryptionFailed(format!("malformed nonce: {}", e)))?;

        let len = nonce.len();
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| {
            Error::DecryptionFailed(format!("nonce must be {} bytes, got {}", NONCE_SIZE, len))
        })?;

        Ok(Self { ciphertext, nonce })
    }

    /// Transport-encoded ciphertext
    pub fn ciphertext_encoded(&self) -> String {
        encoding::encode(&self.ciphertext)
    }

    /// Transport-encoded nonce
    pub fn nonce_encoded(&self) -> String {
        encoding::encode(&self.nonce)
    }

    /// Serialize to the `{ciphertext, nonce}` JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the `{ciphertext, nonce}` JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::DecryptionFailed(format!("malformed envelope: {}", e)))
    }
}

/// An envelope for a recipient together with a copy the sender can open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualEnvelope {
    /// Sealed to the recipient's public key
    pub recipient: Envelope,
    /// Sealed to the sender's own public key
    pub owner_copy: Envelope,
}

impl DualEnvelope {
    /// Serialize to the flattened wire form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&DualEnvelopeWire::from(self))?)
    }

    /// Parse the flattened wire form
    pub fn from_json(json: &str) -> Result<Self> {
        let wire: DualEnvelopeWire = serde_json::from_str(json)
            .map_err(|e| Error::DecryptionFailed(format!("malformed envelope: {}", e)))?;

        Ok(Self {
            recipient: Envelope::from_encoded(&wire.ciphertext, &wire.nonce)?,
            owner_copy: Envelope::from_encoded(&wire.ciphertext_owner, &wire.nonce_owner)?,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DualEnvelopeWire {
    ciphertext: String,
    nonce: String,
    ciphertext_owner: String,
    nonce_owner: String,
}

impl From<&DualEnvelope> for DualEnvelopeWire {
    fn from(dual: &DualEnvelope) -> Self {
        Self {
            ciphertext: dual.recipient.ciphertext_encoded(),
            nonce: dual.recipient.nonce_encoded(),
            ciphertext_owner: dual.owner_copy.ciphertext_encoded(),
            nonce_owner: dual.owner_copy.nonce_encoded(),
        }
    }
}
