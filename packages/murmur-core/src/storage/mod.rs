//! # Storage Module
//!
//! Local persistence for key material.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyStore (crate::keystore)                                     │   │
//! │  │  Active pair, history, published marker                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │  get / write_batch                     │
//! │                                ▼                                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyValueStore (trait)                                          │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │                 ▼                              ▼                        │
//! │  ┌───────────────────────────┐  ┌───────────────────────────────────┐ │
//! │  │  MemoryStore              │  │  SqliteStore                      │ │
//! │  │  Tests, ephemeral         │  │  Durable; each batch is one      │ │
//! │  │  sessions                 │  │  SQLite transaction              │ │
//! │  └───────────────────────────┘  └───────────────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Slots
//!
//! | Slot | Content |
//! |------|---------|
//! | `murmur.e2e.active` | Active key pair JSON |
//! | `murmur.e2e.history` | JSON array of superseded key pairs, oldest first |
//! | `murmur.e2e.published` | Last public key confirmed by the directory |

mod database;
mod memory;
mod schema;

pub use database::SqliteStore;
pub use memory::MemoryStore;

use crate::error::Result;

/// Well-known slot names
pub mod keys {
    /// Active key pair
    pub const ACTIVE: &str = "murmur.e2e.active";

    /// Superseded key pairs
    pub const HISTORY: &str = "murmur.e2e.history";

    /// Last public key the directory accepted
    pub const PUBLISHED: &str = "murmur.e2e.published";
}

/// One mutation inside a [`KeyValueStore::write_batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotWrite {
    /// Set a slot
    Put(String, String),
    /// Remove a slot (no-op when absent)
    Delete(String),
}

impl SlotWrite {
    /// Set `key` to `value`
    pub fn put(key: &str, value: impl Into<String>) -> Self {
        SlotWrite::Put(key.to_string(), value.into())
    }

    /// Remove `key`
    pub fn delete(key: &str) -> Self {
        SlotWrite::Delete(key.to_string())
    }
}

/// Text slot storage with atomic multi-slot writes
///
/// Implementations must apply a batch all-or-nothing: after a failed
/// `write_batch` every slot holds its previous value.
pub trait KeyValueStore: Send + Sync {
    /// Read a slot
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Apply every write in `writes`, or none of them
    fn write_batch(&self, writes: &[SlotWrite]) -> Result<()>;
}
