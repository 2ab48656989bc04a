//! Directory store for published public keys.
//!
//! Uses DashMap for concurrent access. Persists the directory to a JSON
//! file on disk when `data_dir` is configured.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use murmur_core::directory::PublicKeyEntry;

/// One user known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub user_id: String,
    pub username: String,
    /// Canonical transport encoding of the current key. None until published.
    pub public_key: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DirectoryRecord {
    /// Wire entry for this user, if they have published a key.
    pub fn to_entry(&self) -> Option<PublicKeyEntry> {
        self.public_key.as_ref().map(|key| PublicKeyEntry {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            public_key: key.clone(),
        })
    }
}

/// On-disk persistence format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedData {
    users: HashMap<String, DirectoryRecord>,
}

/// Store for directory records.
///
/// Cloning shares the underlying map. When `data_dir` is set, every
/// mutation is written through to disk.
#[derive(Clone)]
pub struct DirectoryStore {
    /// user id → record
    users: Arc<DashMap<String, DirectoryRecord>>,

    /// Serializes writers of the data file.
    persist_lock: Arc<Mutex<()>>,

    /// Directory for persistence. None = in-memory only.
    data_dir: Option<PathBuf>,
}

impl DirectoryStore {
    /// Create an empty store.
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            persist_lock: Arc::new(Mutex::new(())),
            data_dir,
        }
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    fn data_file_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("directory.json"))
    }

    /// Load directory data from disk.
    ///
    /// Called once at startup. A missing or corrupt file logs a warning and
    /// leaves the store empty.
    pub fn load_from_disk(&self) -> usize {
        let path = match self.data_file_path() {
            Some(p) => p,
            None => {
                tracing::info!("No data_dir configured, running in-memory only");
                return 0;
            }
        };

        if !path.exists() {
            tracing::info!(path = %path.display(), "No existing directory file, starting fresh");
            return 0;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read directory file, starting fresh");
                return 0;
            }
        };

        match serde_json::from_str::<PersistedData>(&contents) {
            Ok(data) => {
                let count = data.users.len();
                for (user_id, record) in data.users {
                    self.users.insert(user_id, record);
                }
                tracing::info!(users = count, path = %path.display(), "Directory loaded from disk");
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to parse directory file, starting fresh");
                0
            }
        }
    }

    /// Write the whole directory to disk via temp file + rename.
    fn persist_to_disk(&self) {
        let Some(path) = self.data_file_path() else {
            return;
        };

        let _guard = self.persist_lock.lock().unwrap_or_else(|e| e.into_inner());

        let users: HashMap<String, DirectoryRecord> = self
            .users
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let json = match serde_json::to_string_pretty(&PersistedData { users }) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize directory");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::error!(error = %e, path = %parent.display(), "Failed to create data directory");
                return;
            }
        }

        let tmp_path = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp_path, json.as_bytes()) {
            tracing::error!(error = %e, path = %tmp_path.display(), "Failed to write temp directory file");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            tracing::error!(error = %e, "Failed to rename temp directory file");
        }
    }

    // ── Records ───────────────────────────────────────────────────────────────

    /// Make sure `user_id` exists, keeping any key it already has.
    ///
    /// A changed username is updated in place.
    pub fn ensure_user(&self, user_id: &str, username: &str) {
        let changed = {
            let mut created = false;
            let mut record = self.users.entry(user_id.to_string()).or_insert_with(|| {
                created = true;
                DirectoryRecord {
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                    public_key: None,
                    updated_at: None,
                }
            });
            if record.username != username {
                record.username = username.to_string();
                true
            } else {
                created
            }
        };

        if changed {
            self.persist_to_disk();
        }
    }

    /// Set the caller's current key, replacing any previous one.
    pub fn set_public_key(&self, user_id: &str, username: &str, public_key: String) -> DirectoryRecord {
        let record = DirectoryRecord {
            user_id: user_id.to_string(),
            username: username.to_string(),
            public_key: Some(public_key),
            updated_at: Some(Utc::now()),
        };
        self.users.insert(user_id.to_string(), record.clone());
        self.persist_to_disk();
        record
    }

    /// Look up one user.
    pub fn get(&self, user_id: &str) -> Option<DirectoryRecord> {
        self.users.get(user_id).map(|r| r.value().clone())
    }

    /// Entries for every listed user that has a key, in request order.
    ///
    /// Unknown and keyless users are omitted; duplicate ids appear once.
    pub fn batch(&self, user_ids: &[String]) -> Vec<PublicKeyEntry> {
        let mut seen = std::collections::HashSet::new();
        user_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter_map(|id| self.users.get(id).and_then(|r| r.to_entry()))
            .collect()
    }

    /// Number of known users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of users with a published key.
    pub fn key_count(&self) -> usize {
        self.users.iter().filter(|r| r.public_key.is_some()).count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = DirectoryStore::new(None);
        store.set_public_key("u1", "alice", "KEY1".into());

        let record = store.get("u1").unwrap();
        assert_eq!(record.public_key.as_deref(), Some("KEY1"));
        assert!(record.updated_at.is_some());
        assert!(store.get("u2").is_none());
    }

    #[test]
    fn test_ensure_user_keeps_existing_key() {
        let store = DirectoryStore::new(None);
        store.set_public_key("u1", "alice", "KEY1".into());
        store.ensure_user("u1", "alice2");

        let record = store.get("u1").unwrap();
        assert_eq!(record.username, "alice2");
        assert_eq!(record.public_key.as_deref(), Some("KEY1"));
    }

    #[test]
    fn test_batch_omits_keyless_and_unknown() {
        let store = DirectoryStore::new(None);
        store.set_public_key("u1", "alice", "KEY1".into());
        store.ensure_user("u2", "bob");

        let ids = vec!["u2".into(), "u1".into(), "ghost".into(), "u1".into()];
        let entries = store.batch(&ids);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, "u1");
        assert_eq!(store.user_count(), 2);
        assert_eq!(store.key_count(), 1);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();

        let store = DirectoryStore::new(Some(dir.path().to_path_buf()));
        store.set_public_key("u1", "alice", "KEY1".into());
        store.ensure_user("u2", "bob");

        let reloaded = DirectoryStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(reloaded.load_from_disk(), 2);
        assert_eq!(reloaded.get("u1").unwrap().public_key.as_deref(), Some("KEY1"));
        assert!(!dir.path().join("directory.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("directory.json"), "not json").unwrap();

        let store = DirectoryStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(store.load_from_disk(), 0);
        assert_eq!(store.user_count(), 0);
    }
}
