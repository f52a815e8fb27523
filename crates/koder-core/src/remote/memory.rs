//! In-process remote store.
//!
//! Keeps blobs and documents in `tokio::sync::RwLock`-guarded maps. Failure
//! switches let tests (and offline runs) simulate an unreachable service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    DocumentQuery, FILES_COLLECTION, RemoteError, RemoteResult, RemoteStore, document_id,
    latest_file_documents, rank, score_file,
};
use crate::types::SearchMatch;

/// In-memory remote store
#[derive(Default)]
pub struct InMemoryRemote {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// Documents per collection, ordered by latest write
    documents: Arc<RwLock<HashMap<String, Vec<serde_json::Value>>>>,
    offline: AtomicBool,
    fail_documents: AtomicBool,
}

impl InMemoryRemote {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that fails every call.
    pub fn offline() -> Self {
        let remote = Self::new();
        remote.set_offline(true);
        remote
    }

    /// Make every call fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make only document writes fail, leaving blobs and reads working.
    pub fn fail_documents(&self, fail: bool) {
        self.fail_documents.store(fail, Ordering::SeqCst);
    }

    /// Number of stored blobs.
    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(RemoteError::unavailable("in-memory remote is offline"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn store_blob(&self, key: &str, bytes: &[u8]) -> RemoteResult<()> {
        self.check_online()?;
        self.blobs
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.check_online()?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn store_document(&self, collection: &str, document: &serde_json::Value) -> RemoteResult<()> {
        self.check_online()?;
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(RemoteError::unavailable("document writes are failing"));
        }
        let id = document_id(document)?;

        let mut documents = self.documents.write().await;
        let docs = documents.entry(collection.to_string()).or_default();
        docs.retain(|d| d.get("id").and_then(|v| v.as_str()) != Some(id));
        docs.push(document.clone());
        Ok(())
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> RemoteResult<Vec<serde_json::Value>> {
        self.check_online()?;
        Ok(self
            .documents
            .read()
            .await
            .get(collection)
            .map(|docs| docs.iter().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn search_code(&self, query: &str) -> RemoteResult<Vec<SearchMatch>> {
        self.check_online()?;
        let files = self
            .query_documents(FILES_COLLECTION, &DocumentQuery::all())
            .await?;

        let blobs = self.blobs.read().await;
        let matches = latest_file_documents(files)
            .into_iter()
            .filter_map(|(path, key)| {
                let content = blobs.get(&key)?;
                score_file(&path, &String::from_utf8_lossy(content), query)
            })
            .collect();
        Ok(rank(matches))
    }
}
