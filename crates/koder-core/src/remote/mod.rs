//! Remote tier: the durable, network-accessible side of the memory layer.
//!
//! The memory layer only depends on the [`RemoteStore`] contract: a blob
//! store, an upserting document store with equality queries, and a code
//! search capability. Any backend combination satisfying it is conformant.
//!
//! ## Implementations
//!
//! - [`InMemoryRemote`]: process-local, with failure injection for tests
//! - [`SqliteRemote`] (feature `db`): single-file durable store, also the
//!   backend of `koder-server`
//! - [`HttpRemote`] (feature `client`): client for `koder-server`

mod memory;
#[cfg(feature = "client")]
mod http;
#[cfg(feature = "db")]
mod sqlite;

pub use memory::InMemoryRemote;
#[cfg(feature = "client")]
pub use http::HttpRemote;
#[cfg(feature = "db")]
pub use sqlite::SqliteRemote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SearchMatch;

/// Collection holding per-content file metadata.
pub const FILES_COLLECTION: &str = "files";
/// Collection holding the workspace singleton.
pub const METADATA_COLLECTION: &str = "metadata";
/// Collection holding task records.
pub const TASKS_COLLECTION: &str = "tasks";

/// Result type alias for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Failures of the remote tier.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Network or service failure
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The service answered with an error status
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The service answered with something that could not be decoded
    #[error("invalid remote payload: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Equality filter on a top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: serde_json::Value,
}

/// Document query: all filters must match. An empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub filters: Vec<FieldFilter>,
}

impl DocumentQuery {
    /// Match every document in the collection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality filter.
    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Check a document against every filter.
    pub fn matches(&self, document: &serde_json::Value) -> bool {
        self.filters
            .iter()
            .all(|f| document.get(&f.field) == Some(&f.value))
    }
}

/// Contract of the remote tier.
///
/// Documents are JSON objects carrying a string `id`; `store_document`
/// upserts by that id. `query_documents` returns matches in the store's own
/// order: by each id's latest write, oldest first.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Store bytes under a key, overwriting any previous value.
    async fn store_blob(&self, key: &str, bytes: &[u8]) -> RemoteResult<()>;

    /// Fetch the bytes stored under a key.
    async fn get_blob(&self, key: &str) -> RemoteResult<Option<Vec<u8>>>;

    /// Upsert a document by its `id`.
    async fn store_document(&self, collection: &str, document: &serde_json::Value) -> RemoteResult<()>;

    /// Query a collection.
    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> RemoteResult<Vec<serde_json::Value>>;

    /// Search stored code, best match first.
    async fn search_code(&self, query: &str) -> RemoteResult<Vec<SearchMatch>>;
}

/// Extract the `id` of a document, which every stored document must carry.
pub fn document_id(document: &serde_json::Value) -> RemoteResult<&str> {
    document
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RemoteError::decode("document is missing a string `id`"))
}

/// Score a file for a search query.
///
/// Case-insensitive substring count: each hit in the content counts once,
/// each hit in the path twice. Returns `None` when nothing matches.
pub(crate) fn score_file(path: &str, content: &str, query: &str) -> Option<SearchMatch> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let path_hits = path.to_lowercase().matches(&needle).count();
    let content_hits = content.to_lowercase().matches(&needle).count();
    if path_hits == 0 && content_hits == 0 {
        return None;
    }

    let snippet = content
        .lines()
        .find(|line| line.to_lowercase().contains(&needle))
        .map(|line| line.trim().to_string());

    Some(SearchMatch {
        path: path.to_string(),
        score: (content_hits + 2 * path_hits) as f64,
        snippet,
    })
}

/// Order search matches best first, ties by path.
pub(crate) fn rank(mut matches: Vec<SearchMatch>) -> Vec<SearchMatch> {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    matches
}

/// Keep only the newest file document per path (by `lastModified`, later
/// store position winning ties) and pair each with its blob key.
pub(crate) fn latest_file_documents(documents: Vec<serde_json::Value>) -> Vec<(String, String)> {
    let mut latest: Vec<(String, String, String)> = Vec::new();
    for doc in documents {
        let (Some(path), Some(id)) = (
            doc.get("path").and_then(|v| v.as_str()),
            doc.get("id").and_then(|v| v.as_str()),
        ) else {
            continue;
        };
        let modified = doc
            .get("lastModified")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        match latest.iter_mut().find(|(p, _, _)| p == path) {
            Some(entry) if modified >= entry.2 => {
                entry.1 = id.to_string();
                entry.2 = modified;
            }
            Some(_) => {}
            None => latest.push((path.to_string(), id.to_string(), modified)),
        }
    }
    latest
        .into_iter()
        .map(|(path, id, _)| (path, format!("files/{}", id)))
        .collect()
}
