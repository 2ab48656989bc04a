//! # Envelope Encryption
//!
//! Box-style authenticated encryption between two Curve25519 key pairs.
//!
//! ## Seal / Open Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SEAL (sender side)                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: Shared key                                                    │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  X25519(sender_private, recipient_public) → HSalsa20        │       │
//! │  │           ↓                                                  │       │
//! │  │  Box key (32 bytes)                                          │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Nonce                                                         │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  Random 24 bytes from the OS CSPRNG, fresh per call          │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: XSalsa20-Poly1305(box_key, nonce, utf8(message))              │
//! │           ↓                                                             │
//! │  Envelope { ciphertext (+16-byte tag), nonce }                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    OPEN WITH FALLBACK (recipient side)                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   candidates = [ active, history[n-1], history[n-2], ..., history[0] ] │
//! │                                                                         │
//! │   for key in candidates:                                               │
//! │       box(sender_public, key).open(nonce, ciphertext)                  │
//! │         ├── Ok(plaintext) → return plaintext                           │
//! │         └── Err           → next candidate                             │
//! │                                                                         │
//! │   all failed → DecryptionFailed                                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The construction is the NaCl `crypto_box`, so envelopes interoperate
//! with the web and mobile clients.

use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use rand::rngs::OsRng;
use rand::RngCore;

use super::encoding;
use super::keys::{KeyPair, PrivateKey, PublicKey};
use crate::envelope::{Envelope, NONCE_SIZE};
use crate::error::{Error, Result};

/// Seals and opens message envelopes
///
/// Stateless: which keys to use is always passed in. The caller (usually
/// [`crate::E2eService`]) decides the candidate order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoEngine;

impl CryptoEngine {
    /// Create a new engine
    pub fn new() -> Self {
        Self
    }

    /// Normalize a transport-encoded public key to canonical form
    pub fn normalize(&self, text: &str) -> Result<String> {
        encoding::normalize_key(text)
    }

    /// Seal a message to a transport-encoded recipient key
    ///
    /// Fails with `InvalidKeyFormat` when the recipient key does not decode.
    pub fn seal(
        &self,
        message: &str,
        recipient_public_key: &str,
        sender_private_key: &PrivateKey,
    ) -> Result<Envelope> {
        let recipient = PublicKey::from_encoded(recipient_public_key)?;
        self.seal_to(message, &recipient, sender_private_key)
    }

    /// Seal a message to a decoded recipient key
    pub fn seal_to(
        &self,
        message: &str,
        recipient: &PublicKey,
        sender_private_key: &PrivateKey,
    ) -> Result<Envelope> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|_| Error::RngFailed)?;

        let salsa_box = SalsaBox::new(&recipient.to_box_key(), &sender_private_key.to_box_key());
        let ciphertext = salsa_box
            .encrypt(GenericArray::from_slice(&nonce), message.as_bytes())
            .map_err(|e| Error::EncryptionFailed(e.to_string()))?;

        Ok(Envelope { ciphertext, nonce })
    }

    /// Open an envelope from a transport-encoded sender key
    ///
    /// Tries each candidate private key in order and returns the first
    /// plaintext that authenticates.
    pub fn open<'a, I>(&self, envelope: &Envelope, sender_public_key: &str, try_keys: I) -> Result<String>
    where
        I: IntoIterator<Item = &'a PrivateKey>,
    {
        let sender = PublicKey::from_encoded(sender_public_key)
            .map_err(|e| Error::DecryptionFailed(format!("sender key: {}", e)))?;
        self.open_from(envelope, &sender, try_keys)
    }

    /// Open an envelope from a decoded sender key
    pub fn open_from<'a, I>(&self, envelope: &Envelope, sender: &PublicKey, try_keys: I) -> Result<String>
    where
        I: IntoIterator<Item = &'a PrivateKey>,
    {
        let mut attempts = 0usize;

        for key in try_keys {
            if let Some(plaintext) = open_with(envelope, sender, key) {
                if attempts > 0 {
                    tracing::debug!(
                        sender = %sender.fingerprint(),
                        fallback_depth = attempts,
                        "Opened envelope with a superseded key"
                    );
                }
                return utf8(plaintext);
            }
            attempts += 1;
        }

        tracing::debug!(
            sender = %sender.fingerprint(),
            attempts,
            "No candidate key opened the envelope"
        );
        Err(no_candidate(attempts))
    }

    /// Open an envelope the caller sealed to themselves
    ///
    /// Each candidate pair acts as both sender and recipient, so the owner
    /// copy opens no matter which of our keys was active when it was sealed.
    pub fn open_self_addressed(&self, envelope: &Envelope, candidates: &[KeyPair]) -> Result<String> {
        for pair in candidates {
            if let Some(plaintext) = open_with(envelope, pair.public_key(), pair.private_key()) {
                return utf8(plaintext);
            }
        }

        Err(no_candidate(candidates.len()))
    }
}

fn open_with(envelope: &Envelope, sender: &PublicKey, key: &PrivateKey) -> Option<Vec<u8>> {
    let salsa_box = SalsaBox::new(&sender.to_box_key(), &key.to_box_key());
    salsa_box
        .decrypt(GenericArray::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
        .ok()
}

fn utf8(plaintext: Vec<u8>) -> Result<String> {
    String::from_utf8(plaintext)
        .map_err(|_| Error::DecryptionFailed("plaintext is not valid UTF-8".into()))
}

fn no_candidate(attempts: usize) -> Error {
    if attempts == 0 {
        Error::DecryptionFailed("no candidate keys".into())
    } else {
        Error::DecryptionFailed(format!("none of {} candidate keys opened the envelope", attempts))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> KeyPair {
        KeyPair::generate().unwrap()
    }

    #[test]
    fn test_seal_open_round_trip() {
        let engine = CryptoEngine::new();
        let alice = pair();
        let bob = pair();

        let envelope = engine
            .seal("hi bob", &bob.public_key().to_encoded(), alice.private_key())
            .unwrap();
        let plaintext = engine
            .open(&envelope, &alice.public_key().to_encoded(), [bob.private_key()])
            .unwrap();

        assert_eq!(plaintext, "hi bob");
    }

    #[test]
    fn test_empty_message_round_trip() {
        let engine = CryptoEngine::new();
        let alice = pair();
        let bob = pair();

        let envelope = engine.seal_to("", bob.public_key(), alice.private_key()).unwrap();
        let plaintext = engine
            .open_from(&envelope, alice.public_key(), [bob.private_key()])
            .unwrap();

        assert_eq!(plaintext, "");
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let engine = CryptoEngine::new();
        let alice = pair();
        let bob = pair();

        let e1 = engine.seal_to("same", bob.public_key(), alice.private_key()).unwrap();
        let e2 = engine.seal_to("same", bob.public_key(), alice.private_key()).unwrap();

        assert_ne!(e1.nonce, e2.nonce);
        assert_ne!(e1.ciphertext, e2.ciphertext);
    }

    #[test]
    fn test_open_falls_back_to_history_key() {
        let engine = CryptoEngine::new();
        let alice = pair();
        let bob_old = pair();
        let bob_new = pair();

        let envelope = engine
            .seal_to("old message", bob_old.public_key(), alice.private_key())
            .unwrap();

        let plaintext = engine
            .open_from(
                &envelope,
                alice.public_key(),
                [bob_new.private_key(), bob_old.private_key()],
            )
            .unwrap();

        assert_eq!(plaintext, "old message");
    }

    #[test]
    fn test_no_false_match() {
        let engine = CryptoEngine::new();
        let alice = pair();
        let bob = pair();
        let strangers = [pair(), pair(), pair()];

        let envelope = engine.seal_to("secret", bob.public_key(), alice.private_key()).unwrap();
        let result = engine.open_from(
            &envelope,
            alice.public_key(),
            strangers.iter().map(KeyPair::private_key),
        );

        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_empty_candidates_fail() {
        let engine = CryptoEngine::new();
        let alice = pair();
        let bob = pair();

        let envelope = engine.seal_to("x", bob.public_key(), alice.private_key()).unwrap();
        let result = engine.open_from(&envelope, alice.public_key(), std::iter::empty());

        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let engine = CryptoEngine::new();
        let alice = pair();
        let bob = pair();

        let mut envelope = engine.seal_to("intact", bob.public_key(), alice.private_key()).unwrap();
        envelope.ciphertext[0] ^= 0xff;

        let result = engine.open_from(&envelope, alice.public_key(), [bob.private_key()]);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_seal_rejects_bad_recipient_key() {
        let engine = CryptoEngine::new();
        let alice = pair();

        let result = engine.seal("x", "not-a-key", alice.private_key());
        assert!(matches!(result, Err(Error::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_self_addressed_uses_any_own_pair() {
        let engine = CryptoEngine::new();
        let old = pair();
        let current = pair();

        let envelope = engine
            .seal_to("note to self", old.public_key(), old.private_key())
            .unwrap();

        let plaintext = engine
            .open_self_addressed(&envelope, &[current.clone(), old.clone()])
            .unwrap();
        assert_eq!(plaintext, "note to self");

        let result = engine.open_self_addressed(&envelope, &[current]);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_normalize_requires_key_length() {
        let engine = CryptoEngine::new();
        let key = pair().public_key().to_encoded();
        let url_safe = key.replace('+', "-").replace('/', "_").trim_end_matches('=').to_string();

        assert_eq!(engine.normalize(&url_safe).unwrap(), key);
        assert!(matches!(
            engine.normalize("AAAA"),
            Err(Error::InvalidKeyFormat(_))
        ));
    }
}
