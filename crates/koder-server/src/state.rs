//! Application state.

use koder_core::remote::SqliteRemote;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Backing store for blobs, documents and search
    pub store: Arc<SqliteRemote>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, store: SqliteRemote) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            start_time: Instant::now(),
        })
    }
}
