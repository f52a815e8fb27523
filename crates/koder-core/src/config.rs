//! Memory layer configuration.
//!
//! Passed explicitly to [`crate::memory::MemoryManager`] at construction;
//! nothing is read from process-wide state after that point.
//!
//! Environment variables (see [`MemoryConfig::from_env`] and
//! [`RemoteConfig::from_env`]):
//! - `KODER_MEMORY_PATH`: local cache directory (default `<cwd>/.koder-cache`)
//! - `KODER_REMOTE_URL`: base URL of a `koder-server`
//! - `KODER_REMOTE_TOKEN`: bearer token for the server
//! - `KODER_REMOTE_DB`: path of a SQLite remote store
//! - `KODER_REMOTE_TIMEOUT_SECS`: HTTP request timeout

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default cache directory name, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".koder-cache";

/// Local tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Local cache root
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Largest file the workspace indexer will store (default: 1 MiB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl MemoryConfig {
    /// Create a config rooted at a cache directory
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    /// Defaults with `KODER_MEMORY_PATH` applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from the environment
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("KODER_MEMORY_PATH") {
            if !path.is_empty() {
                self.cache_dir = PathBuf::from(path);
            }
        }
    }

    /// Set the indexer file size limit
    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("cache_dir must not be empty".into()));
        }
        if self.max_file_bytes == 0 {
            return Err(Error::Config("max_file_bytes must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Remote tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of a koder-server
    pub url: Option<String>,

    /// Bearer token for the server
    pub token: Option<String>,

    /// SQLite remote store path, used when no URL is set
    pub database: Option<PathBuf>,

    /// HTTP request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            database: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    /// Defaults with `KODER_REMOTE_*` applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from the environment
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("KODER_REMOTE_URL") {
            self.url = Some(url);
        }
        if let Ok(token) = std::env::var("KODER_REMOTE_TOKEN") {
            self.token = Some(token);
        }
        if let Ok(path) = std::env::var("KODER_REMOTE_DB") {
            self.database = Some(PathBuf::from(path));
        }
        if let Some(secs) = std::env::var("KODER_REMOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.timeout_secs = secs;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "remote url must start with http:// or https://, got {}",
                    url
                )));
            }
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }
}

// Default value functions
fn default_cache_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DEFAULT_CACHE_DIR)
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MemoryConfig::default();
        assert!(config.cache_dir.ends_with(DEFAULT_CACHE_DIR));
        assert_eq!(config.max_file_bytes, 1024 * 1024);
        assert!(config.validate().is_ok());

        let remote = RemoteConfig::default();
        assert_eq!(remote.timeout_secs, 30);
        assert!(remote.url.is_none());
        assert!(remote.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(MemoryConfig::new("").validate().is_err());
        assert!(MemoryConfig::new("/tmp/x").with_max_file_bytes(0).validate().is_err());

        let remote = RemoteConfig {
            url: Some("ftp://example".into()),
            ..Default::default()
        };
        assert!(remote.validate().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: MemoryConfig =
            serde_json::from_str(r#"{ "cache_dir": "/var/cache/koder" }"#).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/koder"));
        assert_eq!(config.max_file_bytes, 1024 * 1024);
    }
}
