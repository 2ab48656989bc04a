//! # Key Store
//!
//! The active key pair and the history of pairs it displaced.
//!
//! ## Rotation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         store(new_pair)                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  before:   active = A          history = [X, Y]                        │
//! │                                                                         │
//! │  store(B): A != B and A not in history → history += A                  │
//! │            B removed from history if present                           │
//! │                                                                         │
//! │  after:    active = B          history = [X, Y, A]                     │
//! │                                                                         │
//! │  Both slots are written in one atomic batch.                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A public key appears at most once across {active, history}. History is
//! only shrunk by [`KeyStore::clear`] and [`KeyStore::prune_history`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::crypto::{KeyPair, PublicKey};
use crate::error::{Error, Result};
use crate::storage::{keys, KeyValueStore, SlotWrite};

/// Local persistence of the active key pair and its history
pub struct KeyStore {
    backend: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write cycles on the slots
    write_lock: Mutex<()>,
}

impl KeyStore {
    /// Create a key store over a slot backend
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    /// Make `pair` the active key pair
    ///
    /// A different previously active pair moves to history.
    pub fn store(&self, pair: &KeyPair) -> Result<()> {
        let _guard = self.write_lock.lock();

        let current = self.read_active()?;
        let mut history = self.read_history()?;

        if let Some(previous) = current {
            if previous != *pair
                && !history
                    .iter()
                    .any(|old| old.public_key() == previous.public_key())
            {
                tracing::info!(
                    fingerprint = %previous.public_key().fingerprint(),
                    "Moving superseded key pair to history"
                );
                history.push(previous);
            }
        }

        let before = history.len();
        history.retain(|old| old.public_key() != pair.public_key());
        if history.len() != before {
            tracing::info!(
                fingerprint = %pair.public_key().fingerprint(),
                "Reactivated a key pair from history"
            );
        }

        self.backend.write_batch(&[
            SlotWrite::put(keys::ACTIVE, serde_json::to_string(pair)?),
            SlotWrite::put(keys::HISTORY, serde_json::to_string(&history)?),
        ])?;

        tracing::debug!(
            fingerprint = %pair.public_key().fingerprint(),
            history_len = history.len(),
            "Stored active key pair"
        );
        Ok(())
    }

    /// The active key pair, if any
    pub fn load(&self) -> Result<Option<KeyPair>> {
        self.read_active()
    }

    /// Superseded key pairs, oldest first
    pub fn load_history(&self) -> Result<Vec<KeyPair>> {
        self.read_history()
    }

    /// Keys to try when opening an envelope: active first, then history
    /// newest first
    pub fn candidate_keys(&self) -> Result<Vec<KeyPair>> {
        let mut candidates: Vec<KeyPair> = self.read_active()?.into_iter().collect();
        candidates.extend(self.read_history()?.into_iter().rev());
        Ok(candidates)
    }

    /// Erase the active pair, the history and the published marker
    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();

        self.backend.write_batch(&[
            SlotWrite::delete(keys::ACTIVE),
            SlotWrite::delete(keys::HISTORY),
            SlotWrite::delete(keys::PUBLISHED),
        ])?;

        tracing::info!("Cleared all local key material");
        Ok(())
    }

    /// Record that the directory accepted `public_key`
    pub fn mark_published(&self, public_key: &PublicKey) -> Result<()> {
        self.backend
            .write_batch(&[SlotWrite::put(keys::PUBLISHED, public_key.to_encoded())])
    }

    /// The last public key the directory accepted
    pub fn last_published(&self) -> Result<Option<PublicKey>> {
        self.backend
            .get(keys::PUBLISHED)?
            .map(|text| {
                PublicKey::from_encoded(&text)
                    .map_err(|e| Error::StorageCorrupted(format!("published key: {}", e)))
            })
            .transpose()
    }

    /// Drop all but the newest `keep` history entries
    ///
    /// Returns how many entries were removed. Messages sealed to a pruned
    /// key can no longer be opened.
    pub fn prune_history(&self, keep: usize) -> Result<usize> {
        let _guard = self.write_lock.lock();

        let mut history = self.read_history()?;
        if history.len() <= keep {
            return Ok(0);
        }

        let removed = history.len() - keep;
        history.drain(..removed);

        self.backend.write_batch(&[SlotWrite::put(
            keys::HISTORY,
            serde_json::to_string(&history)?,
        )])?;

        tracing::info!(removed, kept = keep, "Pruned key history");
        Ok(removed)
    }

    fn read_active(&self) -> Result<Option<KeyPair>> {
        self.backend
            .get(keys::ACTIVE)?
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| Error::StorageCorrupted(format!("active key pair: {}", e)))
            })
            .transpose()
    }

    fn read_history(&self) -> Result<Vec<KeyPair>> {
        match self.backend.get(keys::HISTORY)? {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| Error::StorageCorrupted(format!("key history: {}", e))),
            None => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
