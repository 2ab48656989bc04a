//! # E2E Service
//!
//! The coordinator the rest of the application talks to. Owns one key
//! store, one engine, one key pair provider and one directory client.
//!
//! ## Rotation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    rotate_keys()  (under rotation lock)                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   provider.generate() ──► keystore.store() ──► directory.publish()     │
//! │                                                    │                    │
//! │                                   ok ◄─────────────┴────────► err      │
//! │                                   │                           │         │
//! │                     keystore.mark_published()     key stays active,    │
//! │                                                   marker unchanged;    │
//! │                                                   ensure_published()   │
//! │                                                   retries later        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Restore and clear take the same lock, so two rotations for one identity
//! never interleave. Backup key derivation runs on the blocking pool with a
//! deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use zeroize::Zeroizing;

use crate::backup::{BackupBlob, BackupCodec};
use crate::config::{CoreConfig, DEFAULT_KDF_DEADLINE};
use crate::crypto::{CryptoEngine, KeyPairProvider, OsKeyPairProvider, PublicKey};
use crate::directory::{HttpKeyDirectory, KeyDirectory, PublicKeyRecord};
use crate::dual::DualEncryptionService;
use crate::envelope::{DualEnvelope, Envelope};
use crate::error::{Error, Result};
use crate::keystore::KeyStore;
use crate::storage::SqliteStore;

/// End-to-end encryption coordinator
pub struct E2eService {
    keystore: Arc<KeyStore>,
    engine: CryptoEngine,
    provider: Arc<dyn KeyPairProvider>,
    directory: Arc<dyn KeyDirectory>,
    dual: DualEncryptionService,
    backup: BackupCodec,
    rotation: Mutex<()>,
    kdf_deadline: Duration,
}

impl E2eService {
    /// Assemble a service from its parts
    pub fn new(
        keystore: Arc<KeyStore>,
        provider: Arc<dyn KeyPairProvider>,
        directory: Arc<dyn KeyDirectory>,
    ) -> Self {
        let engine = CryptoEngine::new();
        Self {
            dual: DualEncryptionService::new(keystore.clone(), engine),
            backup: BackupCodec::new(keystore.clone()),
            keystore,
            engine,
            provider,
            directory,
            rotation: Mutex::new(()),
            kdf_deadline: DEFAULT_KDF_DEADLINE,
        }
    }

    /// Override the backup KDF deadline
    pub fn with_kdf_deadline(mut self, deadline: Duration) -> Self {
        self.kdf_deadline = deadline;
        self
    }

    /// Build the production stack: SQLite key store, OS entropy, HTTP
    /// directory
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        let store = SqliteStore::open(config.keystore_path.as_deref())?;
        let keystore = Arc::new(KeyStore::new(Arc::new(store)));
        let directory = Arc::new(HttpKeyDirectory::new(&config.directory)?);

        tracing::info!(
            directory = %config.directory.base_url,
            persistent = config.keystore_path.is_some(),
            "E2E service configured"
        );

        Ok(Self::new(keystore, Arc::new(OsKeyPairProvider), directory)
            .with_kdf_deadline(config.kdf_deadline))
    }

    /// The underlying key store
    pub fn keystore(&self) -> &Arc<KeyStore> {
        &self.keystore
    }

    /// Public key of the active pair, if any
    pub fn active_public_key(&self) -> Result<Option<PublicKey>> {
        Ok(self.keystore.load()?.map(|pair| *pair.public_key()))
    }

    /// Whether a key pair has been generated or restored
    pub fn has_keys(&self) -> Result<bool> {
        Ok(self.keystore.load()?.is_some())
    }

    // ========================================================================
    // KEY LIFECYCLE
    // ========================================================================

    /// Generate a new key pair, make it active and publish it
    ///
    /// The previous pair moves to history. If publishing fails the new pair
    /// stays active and unpublished, and the error is returned.
    pub async fn rotate_keys(&self) -> Result<PublicKey> {
        let _guard = self.rotation.lock().await;

        let pair = self.provider.generate()?;
        self.keystore.store(&pair)?;
        tracing::info!(fingerprint = %pair.public_key().fingerprint(), "Generated new key pair");

        self.publish_locked(pair.public_key()).await?;
        Ok(*pair.public_key())
    }

    /// Publish the active key if the directory has not confirmed it
    ///
    /// Returns whether a publish was performed.
    pub async fn ensure_published(&self) -> Result<bool> {
        let _guard = self.rotation.lock().await;

        let pair = self.keystore.load()?.ok_or(Error::NoActiveKeyPair)?;
        if self.keystore.last_published()? == Some(*pair.public_key()) {
            return Ok(false);
        }

        self.publish_locked(pair.public_key()).await?;
        Ok(true)
    }

    /// Erase all local key material
    ///
    /// The directory keeps the last published key; messages sealed to it
    /// can no longer be opened on this device.
    pub async fn clear_all_keys(&self) -> Result<()> {
        let _guard = self.rotation.lock().await;
        self.keystore.clear()
    }

    /// Drop all but the newest `keep` history entries
    pub async fn prune_history(&self, keep: usize) -> Result<usize> {
        let _guard = self.rotation.lock().await;
        self.keystore.prune_history(keep)
    }

    async fn publish_locked(&self, public_key: &PublicKey) -> Result<()> {
        match self.directory.publish(public_key).await {
            Ok(()) => self.keystore.mark_published(public_key),
            Err(e) => {
                tracing::warn!(
                    fingerprint = %public_key.fingerprint(),
                    error = %e,
                    "Publishing public key failed; key stays active and unpublished"
                );
                Err(e)
            }
        }
    }

    // ========================================================================
    // BACKUP
    // ========================================================================

    /// Export the active pair as backup file JSON
    pub async fn export_backup(&self, password: &str) -> Result<String> {
        let codec = self.backup.clone();
        let password = Zeroizing::new(password.to_string());

        let blob = self
            .run_kdf(move || codec.export(password.as_str()))
            .await?;
        blob.to_json()
    }

    /// Restore a backup, make its pair active and publish it
    ///
    /// The key store is written only after the backup has been fully
    /// decrypted and verified.
    pub async fn restore_backup(&self, backup_json: &str, password: &str) -> Result<PublicKey> {
        let blob = BackupBlob::from_json(backup_json)?;
        let password = Zeroizing::new(password.to_string());

        let codec = self.backup.clone();

        let _guard = self.rotation.lock().await;

        let pair = self
            .run_kdf(move || codec.import(&blob, password.as_str()))
            .await?;

        self.keystore.store(&pair)?;
        tracing::info!(fingerprint = %pair.public_key().fingerprint(), "Restored key pair from backup");

        self.publish_locked(pair.public_key()).await?;
        Ok(*pair.public_key())
    }

    async fn run_kdf<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(work);

        match tokio::time::timeout(self.kdf_deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Internal(format!(
                "Key derivation task failed: {}",
                join_error
            ))),
            Err(_) => {
                tracing::warn!(deadline = ?self.kdf_deadline, "Backup key derivation timed out");
                Err(Error::KeyDerivationFailed("deadline exceeded".into()))
            }
        }
    }

    // ========================================================================
    // MESSAGES
    // ========================================================================

    /// Seal `message` for a recipient key and for ourselves
    pub fn encrypt_for(&self, recipient_public_key: &str, message: &str) -> Result<DualEnvelope> {
        self.dual
            .encrypt_for_recipient_and_self(message, recipient_public_key)
    }

    /// Look up `user_id` in the directory and seal `message` for them and
    /// for ourselves
    pub async fn encrypt_for_user(&self, user_id: &str, message: &str) -> Result<DualEnvelope> {
        let record = self.directory.fetch_one(user_id).await?;
        self.dual.encrypt_for_key(message, &record.public_key)
    }

    /// Open an envelope from `sender_public_key` with the active pair, then
    /// history newest first
    pub fn decrypt(&self, envelope: &Envelope, sender_public_key: &str) -> Result<String> {
        let candidates = self.keystore.candidate_keys()?;
        self.engine.open(
            envelope,
            sender_public_key,
            candidates.iter().map(|pair| pair.private_key()),
        )
    }

    /// Open the owner copy of a message we sent
    pub fn decrypt_own(&self, envelope: &Envelope) -> Result<String> {
        let candidates = self.keystore.candidate_keys()?;
        self.engine.open_self_addressed(envelope, &candidates)
    }

    /// Look up many users' keys at once
    pub async fn fetch_public_keys(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, PublicKeyRecord>> {
        self.directory.fetch_batch(user_ids).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
