//! # Dual Encryption
//!
//! Every outgoing message is sealed twice: once for the recipient and once
//! for the sender, so the sender's other devices (and the sender after a
//! reload) can read their own history.
//!
//! ```text
//!                    ┌──────────────────────────────┐
//!   message ────────►│ seal(recipient_pk, my_sk)    │──► recipient
//!           │        └──────────────────────────────┘
//!           │        ┌──────────────────────────────┐
//!           └───────►│ seal(my_pk, my_sk)           │──► owner_copy
//!                    └──────────────────────────────┘
//! ```

use std::sync::Arc;

use crate::crypto::{CryptoEngine, PublicKey};
use crate::envelope::DualEnvelope;
use crate::error::{Error, Result};
use crate::keystore::KeyStore;

/// Builds recipient + owner-copy envelope pairs with the active key pair
#[derive(Clone)]
pub struct DualEncryptionService {
    keystore: Arc<KeyStore>,
    engine: CryptoEngine,
}

impl DualEncryptionService {
    /// Create a service sealing with the active pair in `keystore`
    pub fn new(keystore: Arc<KeyStore>, engine: CryptoEngine) -> Self {
        Self { keystore, engine }
    }

    /// Seal `message` for `recipient_public_key` and for ourselves
    ///
    /// Fails with `NoActiveKeyPair` when no key pair has been generated or
    /// restored, and `InvalidKeyFormat` when the recipient key is malformed.
    pub fn encrypt_for_recipient_and_self(
        &self,
        message: &str,
        recipient_public_key: &str,
    ) -> Result<DualEnvelope> {
        let recipient = PublicKey::from_encoded(recipient_public_key)?;
        self.encrypt_for_key(message, &recipient)
    }

    /// Same as [`Self::encrypt_for_recipient_and_self`] with a decoded key
    pub fn encrypt_for_key(&self, message: &str, recipient: &PublicKey) -> Result<DualEnvelope> {
        let own = self.keystore.load()?.ok_or(Error::NoActiveKeyPair)?;

        Ok(DualEnvelope {
            recipient: self.engine.seal_to(message, recipient, own.private_key())?,
            owner_copy: self
                .engine
                .seal_to(message, own.public_key(), own.private_key())?,
        })
    }

    /// Open the owner copy of a message we sent
    ///
    /// Tries the active pair, then history newest first.
    pub fn open_owner_copy(&self, dual: &DualEnvelope) -> Result<String> {
        let candidates = self.keystore.candidate_keys()?;
        self.engine.open_self_addressed(&dual.owner_copy, &candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::storage::MemoryStore;

    fn service() -> (DualEncryptionService, Arc<KeyStore>) {
        let keystore = Arc::new(KeyStore::new(Arc::new(MemoryStore::new())));
        (
            DualEncryptionService::new(keystore.clone(), CryptoEngine::new()),
            keystore,
        )
    }

    #[test]
    fn test_both_copies_open() {
        let (dual, keystore) = service();
        let me = KeyPair::generate().unwrap();
        let friend = KeyPair::generate().unwrap();
        keystore.store(&me).unwrap();

        let sealed = dual
            .encrypt_for_recipient_and_self("hello", &friend.public_key().to_encoded())
            .unwrap();

        let engine = CryptoEngine::new();
        let for_friend = engine
            .open_from(&sealed.recipient, me.public_key(), [friend.private_key()])
            .unwrap();
        let for_me = engine
            .open_from(&sealed.owner_copy, me.public_key(), [me.private_key()])
            .unwrap();

        assert_eq!(for_friend, "hello");
        assert_eq!(for_me, "hello");
        assert_ne!(sealed.recipient.nonce, sealed.owner_copy.nonce);
    }

    #[test]
    fn test_copies_do_not_cross_open() {
        let (dual, keystore) = service();
        let me = KeyPair::generate().unwrap();
        let friend = KeyPair::generate().unwrap();
        keystore.store(&me).unwrap();

        let sealed = dual
            .encrypt_for_recipient_and_self("hello", &friend.public_key().to_encoded())
            .unwrap();

        let engine = CryptoEngine::new();
        assert!(matches!(
            engine.open_from(&sealed.owner_copy, me.public_key(), [friend.private_key()]),
            Err(Error::DecryptionFailed(_))
        ));
        assert!(matches!(
            engine.open_from(&sealed.recipient, me.public_key(), [me.private_key()]),
            Err(Error::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_requires_active_pair() {
        let (dual, _) = service();
        let friend = KeyPair::generate().unwrap();

        let result = dual.encrypt_for_recipient_and_self("x", &friend.public_key().to_encoded());
        assert!(matches!(result, Err(Error::NoActiveKeyPair)));
    }

    #[test]
    fn test_owner_copy_survives_rotation() {
        let (dual, keystore) = service();
        let friend = KeyPair::generate().unwrap();
        keystore.store(&KeyPair::generate().unwrap()).unwrap();

        let sealed = dual.encrypt_for_key("before rotation", friend.public_key()).unwrap();
        keystore.store(&KeyPair::generate().unwrap()).unwrap();

        assert_eq!(dual.open_owner_copy(&sealed).unwrap(), "before rotation");
    }
}
