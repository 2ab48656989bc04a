//! # Murmur Core
//!
//! End-to-end encryption for Murmur messaging: per-user key lifecycle,
//! sealed message envelopes with fallback to superseded keys, dual
//! encryption for self-synchronization, and password-protected key backups.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         MURMUR CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                      ┌───────────────────────┐                          │
//! │                      │      E2eService       │  rotation lock           │
//! │                      └───────────┬───────────┘                          │
//! │         ┌──────────────┬─────────┼────────────┬──────────────┐          │
//! │         ▼              ▼         ▼            ▼              ▼          │
//! │  ┌────────────┐ ┌────────────┐ ┌──────────┐ ┌────────────┐ ┌─────────┐ │
//! │  │  KeyPair   │ │  KeyStore  │ │  Dual    │ │  Backup    │ │Directory│ │
//! │  │  Provider  │ │            │ │  Encrypt │ │  Codec     │ │ Client  │ │
//! │  │            │ │ - active   │ │          │ │            │ │         │ │
//! │  │ - OS RNG   │ │ - history  │ │ - recip. │ │ - PBKDF2   │ │ - HTTP  │ │
//! │  │            │ │ - marker   │ │ - owner  │ │ - AES-GCM  │ │ - batch │ │
//! │  └────────────┘ └─────┬──────┘ └────┬─────┘ └────────────┘ └─────────┘ │
//! │                       │             │                                   │
//! │                       ▼             ▼                                   │
//! │               ┌──────────────┐ ┌──────────────┐                         │
//! │               │   Storage    │ │ CryptoEngine │                         │
//! │               │ Memory/SQLite│ │ NaCl box     │                         │
//! │               └──────────────┘ └──────────────┘                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Keys, encoding, envelope encryption, backup KDF
//! - [`envelope`] - Envelope wire format
//! - [`keystore`] - Active key pair and history
//! - [`storage`] - Slot storage backends
//! - [`dual`] - Recipient + owner-copy encryption
//! - [`backup`] - Password-protected key backups
//! - [`directory`] - Key directory client
//! - [`service`] - The coordinator
//!
//! ## Security Model
//!
//! Private keys never leave the client: the directory only ever sees public
//! keys, and backups carry the private key only inside AES-GCM under a
//! password-derived key. Private keys are zeroized on drop and never logged;
//! logs identify keys by fingerprint.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod backup;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod dual;
pub mod envelope;
pub mod error;
pub mod keystore;
pub mod service;
pub mod storage;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use backup::{BackupBlob, BackupCodec};
pub use config::{CoreConfig, DirectoryClientConfig};
pub use crypto::{CryptoEngine, KeyPair, KeyPairProvider, OsKeyPairProvider, PrivateKey, PublicKey};
pub use directory::{HttpKeyDirectory, KeyDirectory, PublicKeyRecord, MAX_BATCH_SIZE};
pub use dual::DualEncryptionService;
pub use envelope::{DualEnvelope, Envelope};
pub use error::{Error, Result};
pub use keystore::KeyStore;
pub use service::E2eService;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
