//! In-memory slot store for tests and ephemeral sessions.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{KeyValueStore, SlotWrite};
use crate::error::Result;

/// Slot store held entirely in memory
///
/// Batches are applied under one write lock, so readers never observe a
/// partially applied batch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether every slot is empty
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn write_batch(&self, writes: &[SlotWrite]) -> Result<()> {
        let mut slots = self.slots.write();
        for write in writes {
            match write {
                SlotWrite::Put(key, value) => {
                    slots.insert(key.clone(), value.clone());
                }
                SlotWrite::Delete(key) => {
                    slots.remove(key);
                }
            }
        }
        Ok(())
    }
}
