//! # Database
//!
//! SQLite-backed slot store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DATABASE OPERATIONS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    KeyStore     │                                                   │
//! │  └────────┬────────┘                                                   │
//! │           │  write_batch([Put, Put, Delete])                           │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   SqliteStore   │  BEGIN                                            │
//! │  │   (this file)   │    INSERT OR REPLACE ...                          │
//! │  │                 │    DELETE ...                                     │
//! │  │                 │  COMMIT  (or ROLLBACK on any error)               │
//! │  └────────┬────────┘                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ┌─────────────────┐                                                   │
//! │  │   SQLite DB     │  - In-memory for tests                            │
//! │  │                 │  - File for production                            │
//! │  └─────────────────┘                                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::{schema, KeyValueStore, SlotWrite};
use crate::error::{Error, Result};

/// Durable slot store on SQLite
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database (useful for testing).
    pub fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| Error::DatabaseError(format!("Failed to open database: {}", e)))?,
            None => Connection::open_in_memory().map_err(|e| {
                Error::DatabaseError(format!("Failed to create in-memory database: {}", e))
            })?,
        };

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .ok();

        match version {
            None => {
                conn.execute_batch(schema::CREATE_TABLES)
                    .map_err(|e| Error::DatabaseError(format!("Failed to create tables: {}", e)))?;
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| Error::DatabaseError(format!("Failed to set schema version: {}", e)))?;

                tracing::info!("Key store schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(Error::DatabaseError(format!(
                    "Key store schema version {} is newer than supported {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(v) => {
                tracing::debug!("Key store schema version: {}", v);
            }
        }

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();

        let result = conn.query_row(
            "SELECT value FROM key_slots WHERE key = ?",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!("Failed to read slot {}: {}", key, e))),
        }
    }

    fn write_batch(&self, writes: &[SlotWrite]) -> Result<()> {
        let mut conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        let tx = conn
            .transaction()
            .map_err(|e| Error::StorageWriteError(format!("Failed to begin transaction: {}", e)))?;

        for write in writes {
            let outcome = match write {
                SlotWrite::Put(key, value) => tx.execute(
                    "INSERT OR REPLACE INTO key_slots (key, value, updated_at) VALUES (?, ?, ?)",
                    params![key, value, now],
                ),
                SlotWrite::Delete(key) => {
                    tx.execute("DELETE FROM key_slots WHERE key = ?", params![key])
                }
            };
            // Dropping `tx` on the error path rolls the batch back
            outcome.map_err(|e| Error::StorageWriteError(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| Error::StorageWriteError(format!("Failed to commit: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_creation() {
        let store = SqliteStore::open(None).unwrap();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_batch_write_and_delete() {
        let store = SqliteStore::open(None).unwrap();

        store
            .write_batch(&[SlotWrite::put("a", "1"), SlotWrite::put("b", "2")])
            .unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store
            .write_batch(&[SlotWrite::put("a", "3"), SlotWrite::delete("b")])
            .unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("3"));
        assert!(store.get("b").unwrap().is_none());
    }

    #[test]
    fn test_reopen_persists_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteStore::open(Some(path)).unwrap();
            store.write_batch(&[SlotWrite::put("k", "v")]).unwrap();
        }

        let reopened = SqliteStore::open(Some(path)).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let store = SqliteStore::open(None).unwrap();
        store.write_batch(&[SlotWrite::put("a", "before")]).unwrap();

        store
            .conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_poison BEFORE INSERT ON key_slots
                 WHEN NEW.key = 'poison'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store.write_batch(&[
            SlotWrite::put("a", "after"),
            SlotWrite::put("poison", "x"),
        ]);

        assert!(matches!(result, Err(Error::StorageWriteError(_))));
        assert_eq!(store.get("a").unwrap().as_deref(), Some("before"));
    }
}
