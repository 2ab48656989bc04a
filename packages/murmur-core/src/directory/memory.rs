//! In-process key directory for tests and offline development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{prepare_batch, KeyDirectory, PublicKeyRecord};
use crate::crypto::PublicKey;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct UserEntry {
    username: String,
    public_key: Option<PublicKey>,
}

/// Key directory held in memory
///
/// `publish` acts on behalf of one fixed caller. Can be switched offline
/// to simulate transport failures.
#[derive(Debug)]
pub struct MemoryDirectory {
    caller_id: String,
    users: RwLock<HashMap<String, UserEntry>>,
    offline: AtomicBool,
    requests: AtomicUsize,
}

impl MemoryDirectory {
    /// Create a directory whose `publish` calls act for `caller_id`
    pub fn new(caller_id: &str, caller_username: &str) -> Self {
        let directory = Self {
            caller_id: caller_id.to_string(),
            users: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        };
        directory.register_user(caller_id, caller_username);
        directory
    }

    /// Add a user without a public key
    pub fn register_user(&self, user_id: &str, username: &str) {
        self.users
            .write()
            .entry(user_id.to_string())
            .or_insert_with(|| UserEntry {
                username: username.to_string(),
                public_key: None,
            });
    }

    /// Add or update a user with a public key
    pub fn set_key(&self, user_id: &str, username: &str, public_key: PublicKey) {
        self.users.write().insert(
            user_id.to_string(),
            UserEntry {
                username: username.to_string(),
                public_key: Some(public_key),
            },
        );
    }

    /// The key currently published for `user_id`
    pub fn published_key(&self, user_id: &str) -> Option<PublicKey> {
        self.users.read().get(user_id).and_then(|u| u.public_key)
    }

    /// Make every call fail with `NetworkError`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls that reached the directory
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn begin_request(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkError("directory unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyDirectory for MemoryDirectory {
    async fn publish(&self, public_key: &PublicKey) -> Result<()> {
        self.begin_request()?;

        let mut users = self.users.write();
        let entry = users
            .entry(self.caller_id.clone())
            .or_insert_with(|| UserEntry {
                username: self.caller_id.clone(),
                public_key: None,
            });
        entry.public_key = Some(*public_key);
        Ok(())
    }

    async fn fetch_one(&self, user_id: &str) -> Result<PublicKeyRecord> {
        self.begin_request()?;

        let users = self.users.read();
        let entry = users
            .get(user_id)
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        let public_key = entry
            .public_key
            .ok_or_else(|| Error::NoPublicKeySet(user_id.to_string()))?;

        Ok(PublicKeyRecord {
            user_id: user_id.to_string(),
            username: entry.username.clone(),
            public_key,
        })
    }

    async fn fetch_batch(&self, user_ids: &[String]) -> Result<HashMap<String, PublicKeyRecord>> {
        let unique = prepare_batch(user_ids)?;
        if unique.is_empty() {
            return Ok(HashMap::new());
        }
        self.begin_request()?;

        let users = self.users.read();
        Ok(unique
            .into_iter()
            .filter_map(|id| {
                let entry = users.get(&id)?;
                let public_key = entry.public_key?;
                Some((
                    id.clone(),
                    PublicKeyRecord {
                        user_id: id,
                        username: entry.username.clone(),
                        public_key,
                    },
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[tokio::test]
    async fn test_fetch_one_errors() {
        let directory = MemoryDirectory::new("me", "me");
        directory.register_user("keyless", "k");

        assert!(matches!(
            directory.fetch_one("ghost").await,
            Err(Error::UserNotFound(_))
        ));
        assert!(matches!(
            directory.fetch_one("keyless").await,
            Err(Error::NoPublicKeySet(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_limit_checked_before_request() {
        let directory = MemoryDirectory::new("me", "me");
        let ids: Vec<String> = (0..51).map(|i| format!("u{}", i)).collect();

        assert!(matches!(
            directory.fetch_batch(&ids).await,
            Err(Error::TooManyUsers { .. })
        ));
        assert!(directory.fetch_batch(&[]).await.unwrap().is_empty());
        assert_eq!(directory.request_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_omits_keyless_users() {
        let directory = MemoryDirectory::new("me", "me");
        let bob = KeyPair::generate().unwrap();
        directory.set_key("bob", "Bob", *bob.public_key());
        directory.register_user("carol", "Carol");

        let ids = vec!["bob".to_string(), "carol".to_string(), "ghost".to_string()];
        let found = directory.fetch_batch(&ids).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found["bob"].public_key, *bob.public_key());
    }
}
