//! Configuration loaded from code or environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `MURMUR_DIRECTORY_URL` | `http://localhost:8080` |
//! | `MURMUR_DIRECTORY_TOKEN` | none |
//! | `MURMUR_REQUEST_TIMEOUT_SECS` | 10 |
//! | `MURMUR_KDF_DEADLINE_SECS` | 30 |
//! | `MURMUR_KEYSTORE_PATH` | none (in-memory) |

use std::env;
use std::time::Duration;

/// Default directory request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default deadline for one backup key derivation
pub const DEFAULT_KDF_DEADLINE: Duration = Duration::from_secs(30);

/// How to reach the key directory
#[derive(Debug, Clone)]
pub struct DirectoryClientConfig {
    /// Base URL, e.g. `https://chat.example.com`
    pub base_url: String,
    /// Bearer token identifying the caller
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for DirectoryClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl DirectoryClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_url: env::var("MURMUR_DIRECTORY_URL").unwrap_or(defaults.base_url),
            token: env::var("MURMUR_DIRECTORY_TOKEN").ok().filter(|t| !t.is_empty()),
            request_timeout: secs_from_env("MURMUR_REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout),
        }
    }
}

/// Configuration for the E2E core
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Key directory client settings
    pub directory: DirectoryClientConfig,
    /// Upper bound on one backup key derivation
    pub kdf_deadline: Duration,
    /// SQLite key store path (in-memory when None)
    pub keystore_path: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryClientConfig::default(),
            kdf_deadline: DEFAULT_KDF_DEADLINE,
            keystore_path: None,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            directory: DirectoryClientConfig::from_env(),
            kdf_deadline: secs_from_env("MURMUR_KDF_DEADLINE_SECS").unwrap_or(DEFAULT_KDF_DEADLINE),
            keystore_path: env::var("MURMUR_KEYSTORE_PATH").ok().filter(|p| !p.is_empty()),
        }
    }
}

fn secs_from_env(name: &str) -> Option<Duration> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            tracing::warn!(variable = name, value = %raw, "Ignoring invalid duration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.kdf_deadline, DEFAULT_KDF_DEADLINE);
        assert_eq!(config.directory.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.directory.token.is_none());
        assert!(config.keystore_path.is_none());
    }

    #[test]
    fn test_invalid_duration_is_ignored() {
        env::set_var("MURMUR_TEST_BAD_SECS", "soon");
        assert!(secs_from_env("MURMUR_TEST_BAD_SECS").is_none());

        env::set_var("MURMUR_TEST_GOOD_SECS", "7");
        assert_eq!(
            secs_from_env("MURMUR_TEST_GOOD_SECS"),
            Some(Duration::from_secs(7))
        );
    }
}
