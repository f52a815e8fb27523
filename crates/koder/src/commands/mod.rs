//! Command implementations for koder CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod files;
pub mod index;
pub mod search;
pub mod status;
pub mod task;
pub mod workspace;

use anyhow::{Context, Result};
use koder_core::config::RemoteConfig;
use koder_core::remote::{HttpRemote, InMemoryRemote, RemoteStore, SqliteRemote};
use koder_core::MemoryManager;
use std::sync::Arc;

use crate::config::Config;

/// Which remote tier a configuration selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteKind {
    Http,
    Sqlite,
    Local,
}

impl RemoteKind {
    pub fn select(config: &RemoteConfig) -> Self {
        if config.url.is_some() {
            RemoteKind::Http
        } else if config.database.is_some() {
            RemoteKind::Sqlite
        } else {
            RemoteKind::Local
        }
    }
}

/// Build the configured remote tier.
///
/// A URL selects a koder-server, otherwise a database path selects a SQLite
/// store. With neither, the remote tier only lives for this process.
pub fn connect_remote(config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>> {
    config.validate()?;

    if config.url.is_some() {
        let remote = HttpRemote::new(config).context("Failed to create remote client")?;
        return Ok(Arc::new(remote));
    }

    if let Some(path) = &config.database {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create remote database directory")?;
        }
        let remote = SqliteRemote::open(path)
            .with_context(|| format!("Failed to open remote database {}", path.display()))?;
        return Ok(Arc::new(remote));
    }

    tracing::warn!(
        "No remote configured (set KODER_REMOTE_URL or KODER_REMOTE_DB); remote writes are not kept"
    );
    Ok(Arc::new(InMemoryRemote::new()))
}

/// Open the memory manager for a configuration.
pub async fn open_memory(config: &Config) -> Result<Arc<MemoryManager>> {
    let remote = connect_remote(&config.remote)?;
    let memory = MemoryManager::new(config.memory.clone(), remote)
        .await
        .with_context(|| {
            format!(
                "Failed to open memory cache at {}",
                config.memory.cache_dir.display()
            )
        })?;
    Ok(Arc::new(memory))
}
