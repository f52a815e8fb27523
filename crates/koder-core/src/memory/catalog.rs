//! Metadata catalog: descriptive records in the remote document store.
//!
//! Every record is written as a [`VersionedRecord`]. Documents that fail to
//! decode are skipped with a warning rather than failing the whole query.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::remote::{
    DocumentQuery, FILES_COLLECTION, METADATA_COLLECTION, RemoteStore, TASKS_COLLECTION,
};
use crate::types::{
    FileMetadata, Record, SearchMatch, TaskMetadata, VersionedRecord, WorkspaceDocument,
    WorkspaceMetadata,
};

/// Remote catalog of file, workspace and task records
pub struct MetadataCatalog {
    remote: Arc<dyn RemoteStore>,
}

impl MetadataCatalog {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Upsert the record describing one content value.
    pub async fn upsert(&self, meta: &FileMetadata) -> Result<()> {
        let document = VersionedRecord::new(Record::File(meta.clone())).to_document()?;
        self.remote
            .store_document(FILES_COLLECTION, &document)
            .await
            .map_err(|e| {
                Error::remote(
                    "upsert file metadata",
                    format!("{} ({})", meta.path, meta.id),
                    e,
                )
            })
    }

    /// Newest record stored under a path.
    ///
    /// The greatest `lastModified` wins; on equal values the record later in
    /// the store's order wins.
    pub async fn find_by_path(&self, path: &str) -> Result<Option<FileMetadata>> {
        let query = DocumentQuery::all().field_eq("path", path);
        let documents = self
            .remote
            .query_documents(FILES_COLLECTION, &query)
            .await
            .map_err(|e| Error::remote("find file metadata", path, e))?;

        let found = newest_per_path(decode_files(documents)).into_iter().next();
        debug!("Catalog lookup for {}: {}", path, if found.is_some() { "hit" } else { "miss" });
        Ok(found)
    }

    /// Newest record for every distinct path.
    pub async fn list_latest(&self) -> Result<Vec<FileMetadata>> {
        let documents = self
            .remote
            .query_documents(FILES_COLLECTION, &DocumentQuery::all())
            .await
            .map_err(|e| Error::remote("list file metadata", FILES_COLLECTION, e))?;

        Ok(newest_per_path(decode_files(documents)))
    }

    /// Upsert the workspace singleton.
    pub async fn upsert_workspace(&self, meta: &WorkspaceMetadata) -> Result<()> {
        let document =
            VersionedRecord::new(Record::Workspace(WorkspaceDocument::new(meta.clone())))
                .to_document()?;
        self.remote
            .store_document(METADATA_COLLECTION, &document)
            .await
            .map_err(|e| Error::remote("upsert workspace metadata", WorkspaceDocument::ID, e))
    }

    /// Upsert a task record.
    pub async fn upsert_task(&self, task: &TaskMetadata) -> Result<()> {
        let document = VersionedRecord::new(Record::Task(task.clone())).to_document()?;
        self.remote
            .store_document(TASKS_COLLECTION, &document)
            .await
            .map_err(|e| Error::remote("upsert task metadata", task.id.as_str(), e))
    }

    /// Delegate to the remote search capability.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
        self.remote
            .search_code(query)
            .await
            .map_err(|e| Error::remote("search code", query, e))
    }
}

fn decode_files(documents: Vec<serde_json::Value>) -> Vec<FileMetadata> {
    documents
        .into_iter()
        .filter_map(|doc| match VersionedRecord::from_document(doc) {
            Ok(VersionedRecord {
                record: Record::File(meta),
                ..
            }) => Some(meta),
            Ok(other) => {
                warn!("Skipping non-file record {} in files collection", other.id());
                None
            }
            Err(e) => {
                warn!("Skipping undecodable file record: {}", e);
                None
            }
        })
        .collect()
}

/// Reduce records in store order to the newest per path, keeping the order
/// in which paths first appear.
fn newest_per_path(records: Vec<FileMetadata>) -> Vec<FileMetadata> {
    let mut latest: Vec<FileMetadata> = Vec::new();
    for meta in records {
        match latest.iter_mut().find(|m| m.path == meta.path) {
            Some(current) if meta.last_modified >= current.last_modified => *current = meta,
            Some(_) => {}
            None => latest.push(meta),
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemote;
    use crate::types::ContentHash;

    fn meta(path: &str, content: &[u8], modified: &str) -> FileMetadata {
        FileMetadata {
            id: ContentHash::compute(content),
            path: path.to_string(),
            last_modified: modified.to_string(),
            file_type: "ts".to_string(),
            size: content.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_find_by_path_prefers_newest() {
        let remote = Arc::new(InMemoryRemote::new());
        let catalog = MetadataCatalog::new(remote);

        let newer = meta("a.ts", b"new", "2024-03-01T00:00:00Z");
        let older = meta("a.ts", b"old", "2024-01-01T00:00:00Z");
        catalog.upsert(&newer).await.unwrap();
        catalog.upsert(&older).await.unwrap();
        catalog.upsert(&meta("b.ts", b"b", "2025-01-01T00:00:00Z")).await.unwrap();

        assert_eq!(catalog.find_by_path("a.ts").await.unwrap(), Some(newer));
        assert_eq!(catalog.find_by_path("missing.ts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_equal_timestamps_fall_back_to_store_order() {
        let catalog = MetadataCatalog::new(Arc::new(InMemoryRemote::new()));
        let first = meta("a.ts", b"1", "same");
        let second = meta("a.ts", b"2", "same");
        catalog.upsert(&first).await.unwrap();
        catalog.upsert(&second).await.unwrap();

        assert_eq!(catalog.find_by_path("a.ts").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_rewritten_record_wins_equal_timestamps() {
        let catalog = MetadataCatalog::new(Arc::new(InMemoryRemote::new()));
        let c1 = meta("x", b"C1", "same");
        let c2 = meta("x", b"C2", "same");
        catalog.upsert(&c1).await.unwrap();
        catalog.upsert(&c2).await.unwrap();
        catalog.upsert(&c1).await.unwrap();

        assert_eq!(catalog.find_by_path("x").await.unwrap(), Some(c1));
    }

    #[tokio::test]
    async fn test_list_latest_one_per_path() {
        let catalog = MetadataCatalog::new(Arc::new(InMemoryRemote::new()));
        catalog.upsert(&meta("a.ts", b"a1", "1")).await.unwrap();
        catalog.upsert(&meta("b.ts", b"b1", "1")).await.unwrap();
        let a2 = meta("a.ts", b"a2", "2");
        catalog.upsert(&a2).await.unwrap();

        let latest = catalog.list_latest().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0], a2);
        assert_eq!(latest[1].path, "b.ts");
    }

    #[tokio::test]
    async fn test_undecodable_documents_are_skipped() {
        let remote = Arc::new(InMemoryRemote::new());
        remote
            .store_document(
                FILES_COLLECTION,
                &serde_json::json!({ "id": "junk", "path": "a.ts" }),
            )
            .await
            .unwrap();
        let catalog = MetadataCatalog::new(remote);
        let good = meta("a.ts", b"good", "1");
        catalog.upsert(&good).await.unwrap();

        assert_eq!(catalog.find_by_path("a.ts").await.unwrap(), Some(good));
    }

    #[tokio::test]
    async fn test_remote_failures_name_the_target() {
        let remote = Arc::new(InMemoryRemote::new());
        remote.fail_documents(true);
        let catalog = MetadataCatalog::new(remote.clone());

        let err = catalog.upsert(&meta("src/x.ts", b"x", "1")).await.unwrap_err();
        assert!(err.is_remote());
        assert!(err.to_string().contains("src/x.ts"));

        remote.set_offline(true);
        let err = catalog.find_by_path("src/x.ts").await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_workspace_and_task_collections() {
        let remote = Arc::new(InMemoryRemote::new());
        let catalog = MetadataCatalog::new(remote.clone());

        let ws = WorkspaceMetadata {
            path: "/ws".into(),
            last_indexed: "now".into(),
            file_count: 2,
        };
        catalog.upsert_workspace(&ws).await.unwrap();
        catalog.upsert_workspace(&ws).await.unwrap();

        let docs = remote
            .query_documents(METADATA_COLLECTION, &DocumentQuery::all())
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], "workspace");
        assert_eq!(docs[0]["kind"], "workspace");

        let task = TaskMetadata {
            id: "t1".into(),
            title: "Task".into(),
            timestamp: 1,
            messages: vec![],
            complete: false,
        };
        catalog.upsert_task(&task).await.unwrap();
        let docs = remote
            .query_documents(TASKS_COLLECTION, &DocumentQuery::all().field_eq("id", "t1"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }
}
