//! # Cryptography Module
//!
//! All cryptographic primitives used by Murmur Core.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    KEY LIFECYCLE                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │   KeyPairProvider ──► KeyStore (active) ──► Key Directory      │   │
//! │  │                           │                 (public half only) │   │
//! │  │                           │ rotation                            │   │
//! │  │                           ▼                                     │   │
//! │  │                     KeyStore (history)                          │   │
//! │  │                     kept for old messages                       │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 MESSAGE ENVELOPES                               │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  X25519 + XSalsa20-Poly1305 (NaCl box)                         │   │
//! │  │  • 32-byte keys                                                │   │
//! │  │  • 24-byte random nonce per message                            │   │
//! │  │  • 16-byte Poly1305 tag                                        │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 KEY BACKUPS                                     │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  PBKDF2-HMAC-SHA256 (100,000 rounds) → AES-256-GCM             │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose | Why Chosen |
//! |-----------|---------|------------|
//! | X25519 + XSalsa20-Poly1305 | Envelopes | Wire compatible with the web client |
//! | PBKDF2-HMAC-SHA256 | Backup KDF | Matches existing backup files |
//! | AES-256-GCM | Backup payload | AEAD, matches existing backup files |
//! | SHA-256 | Fingerprints | Log-safe key identifiers |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: private keys are zeroized when dropped
//! 2. **Secure Random**: `rand::rngs::OsRng` for keys, nonces, salts and IVs
//! 3. **No Key Reuse**: a fresh nonce for every seal

pub mod encoding;
mod encryption;
mod kdf;
mod keys;

pub use encoding::{normalize_key, KEY_SIZE};
pub use encryption::CryptoEngine;
pub use kdf::{derive_backup_key, key_fingerprint, BACKUP_KDF_ITERATIONS, BACKUP_SALT_SIZE};
pub use keys::{KeyPair, KeyPairProvider, OsKeyPairProvider, PrivateKey, PublicKey};
