//! Server configuration.

use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:7878";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address
    pub addr: SocketAddr,
    /// SQLite database path
    pub database_path: PathBuf,
    /// Bearer token required on `/api` routes, if set
    pub token: Option<String>,
    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7878)),
            database_path: default_data_dir().join("server.db"),
            token: None,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// - `KODER_SERVER_ADDR`: listen address (default `127.0.0.1:7878`)
    /// - `KODER_SERVER_DB`: database path (default `~/.koder/server.db`)
    /// - `KODER_SERVER_TOKEN`: bearer token for `/api` routes
    /// - `KODER_SERVER_MAX_BODY`: request body limit in bytes
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("KODER_SERVER_ADDR") {
            config.addr = addr
                .parse()
                .with_context(|| format!("Invalid KODER_SERVER_ADDR: {}", addr))?;
        }
        if let Ok(path) = std::env::var("KODER_SERVER_DB") {
            config.database_path = PathBuf::from(path);
        }
        config.token = std::env::var("KODER_SERVER_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());
        if let Ok(limit) = std::env::var("KODER_SERVER_MAX_BODY") {
            config.max_body_bytes = limit
                .parse()
                .with_context(|| format!("Invalid KODER_SERVER_MAX_BODY: {}", limit))?;
        }

        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        Ok(config)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".koder")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_addr_matches_constant() {
        let config = Config::default();
        assert_eq!(config.addr, DEFAULT_ADDR.parse::<SocketAddr>().unwrap());
        assert!(config.database_path.ends_with("server.db"));
        assert!(config.token.is_none());
    }
}
