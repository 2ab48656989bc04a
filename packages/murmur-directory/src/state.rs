//! Server state and configuration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::TokenRegistry;
use crate::store::DirectoryStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub host: String,
    pub port: u16,
    /// Where `directory.json` lives. None = in-memory only.
    pub data_dir: Option<PathBuf>,
    /// JSON file of bearer tokens.
    pub tokens_file: Option<PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            data_dir: None,
            tokens_file: None,
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub store: DirectoryStore,
    pub tokens: Arc<TokenRegistry>,
}

impl AppState {
    pub fn new(store: DirectoryStore, tokens: TokenRegistry) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
        }
    }

    /// Build state from configuration, loading persisted data and tokens.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self, String> {
        let store = DirectoryStore::new(config.data_dir.clone());
        store.load_from_disk();

        let tokens = match &config.tokens_file {
            Some(path) => TokenRegistry::load(path)?,
            None => {
                tracing::warn!("No tokens file configured, every API request will be rejected");
                TokenRegistry::new()
            }
        };
        tracing::info!(tokens = tokens.len(), users = store.user_count(), "Directory state ready");

        Ok(Self::new(store, tokens))
    }
}
