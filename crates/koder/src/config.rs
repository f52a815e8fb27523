//! Configuration management for koder.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Command-line flags (`--cache-dir`, `--remote-url`, `--remote-db`)
//! 2. Environment variables (`KODER_*`)
//! 3. Config file (`KODER_CONFIG` or `<config dir>/koder/config.toml`)
//! 4. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use koder_core::config::{MemoryConfig, RemoteConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local cache settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Remote tier settings
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&Self::config_path())?;
        config.memory.apply_env();
        config.remote.apply_env();
        Ok(config)
    }

    /// Read a config file, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, args: &GlobalArgs) {
        if let Some(dir) = &args.cache_dir {
            self.memory.cache_dir = dir.clone();
        }
        if let Some(url) = &args.remote_url {
            self.remote.url = Some(url.clone());
        }
        if let Some(db) = &args.remote_db {
            self.remote.database = Some(db.clone());
        }
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("KODER_CONFIG") {
            PathBuf::from(path)
        } else {
            default_config_dir().join("config.toml")
        }
    }
}

fn default_config_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "koder", "koder") {
        proj_dirs.config_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".koder")
    }
}
