//! Hybrid content-addressable memory.
//!
//! Stores workspace files and task records across two tiers: a fast local
//! cache directory and a durable remote store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        MemoryManager                            │
//! │  ┌──────────────┐   ┌──────────────┐   ┌─────────────────────┐  │
//! │  │  PathIndex   │   │ ContentStore │   │   MetadataCatalog   │  │
//! │  │ path → hash  │   │ hash → bytes │   │ hash → FileMetadata │  │
//! │  │ (local only) │   │ (both tiers) │   │   (remote only)     │  │
//! │  └──────────────┘   └──────┬───────┘   └──────────┬──────────┘  │
//! │                            │                      │             │
//! │               cache dir ◀──┴──▶ RemoteStore ◀─────┘             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes go local first, then remote. Reads resolve locally and fall back
//! to the remote tier, writing whatever they find back into the cache.
//!
//! ## Local layout
//!
//! ```text
//! <cache_dir>/
//! ├── <sha256 hex>            # raw content, one file per hash
//! ├── path_mappings.json      # { "<path>": "<hash>", ... }
//! ├── workspace_metadata.json # { path, lastIndexed, fileCount }
//! └── tasks/<id>.json         # task records
//! ```

mod catalog;
mod content;
mod manager;
mod path_index;

pub use catalog::MetadataCatalog;
pub use content::ContentStore;
pub use manager::MemoryManager;
pub use path_index::PathIndex;

use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Path table file name inside the cache directory.
pub const PATH_MAPPINGS_FILE: &str = "path_mappings.json";
/// Workspace metadata file name inside the cache directory.
pub const WORKSPACE_METADATA_FILE: &str = "workspace_metadata.json";
/// Task record directory inside the cache directory.
pub const TASKS_DIR: &str = "tasks";

/// Outcome of the remote half of a write that does not fail on remote errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSync {
    /// Both tiers hold the new value
    Synced,
    /// Local tier updated; the remote write failed and lags behind
    Pending { reason: String },
}

impl RemoteSync {
    pub fn is_synced(&self) -> bool {
        matches!(self, RemoteSync::Synced)
    }
}

/// Write a file through a temp sibling and rename, so readers never observe
/// a partially written file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8], operation: &'static str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        return Err(Error::local_io(operation, tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::local_io(operation, path, e));
    }
    Ok(())
}

/// Read a file, mapping "not found" to `None`.
pub(crate) async fn read_optional(path: &Path, operation: &'static str) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::local_io(operation, path, e)),
    }
}
