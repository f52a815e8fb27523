//! Memory manager: the single read/write API over both tiers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::{
    ContentStore, MetadataCatalog, PathIndex, RemoteSync, TASKS_DIR, WORKSPACE_METADATA_FILE,
    read_optional, write_atomic,
};
use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::remote::RemoteStore;
use crate::types::{ContentHash, FileInfo, FileMetadata, SearchMatch, TaskMetadata, WorkspaceMetadata};

/// Orchestrates the content store, path index and metadata catalog.
///
/// Holds no process-wide state: the cache location comes from the
/// [`MemoryConfig`] and the file counter belongs to this instance.
pub struct MemoryManager {
    config: MemoryConfig,
    content: ContentStore,
    index: PathIndex,
    catalog: MetadataCatalog,
    files_stored: AtomicU64,
}

impl MemoryManager {
    /// Open the cache directory (creating it if needed) and attach a remote tier.
    pub async fn new(config: MemoryConfig, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        config.validate()?;

        let tasks_dir = config.cache_dir.join(TASKS_DIR);
        tokio::fs::create_dir_all(&tasks_dir)
            .await
            .map_err(|e| Error::local_io("create cache directory", &tasks_dir, e))?;

        let index = PathIndex::open(&config.cache_dir).await?;
        info!(
            "Memory cache at {} ({} path mappings)",
            config.cache_dir.display(),
            index.len().await
        );

        Ok(Self {
            content: ContentStore::new(&config.cache_dir, Arc::clone(&remote)),
            catalog: MetadataCatalog::new(remote),
            index,
            config,
            files_stored: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn content_store(&self) -> &ContentStore {
        &self.content
    }

    pub fn path_index(&self) -> &PathIndex {
        &self.index
    }

    pub fn catalog(&self) -> &MetadataCatalog {
        &self.catalog
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    /// Store a file under its path.
    ///
    /// Content lands locally (fatal on failure) and is replicated to the
    /// remote blob store (best effort). The path mapping is then persisted
    /// and the metadata record upserted. A failed metadata upsert is
    /// returned as an error, but the file stays retrievable locally.
    pub async fn store_file(&self, info: &FileInfo) -> Result<ContentHash> {
        let hash = ContentHash::compute(&info.content);
        if let Some(expected) = &info.hash {
            if *expected != hash {
                return Err(Error::HashMismatch {
                    path: info.path.clone(),
                    expected: expected.to_string(),
                    actual: hash.to_string(),
                });
            }
        }

        self.content.put_hashed(&hash, &info.content).await?;
        self.index.set(&info.path, hash.clone()).await?;
        self.catalog
            .upsert(&FileMetadata::describe(info, hash.clone()))
            .await?;

        self.files_stored.fetch_add(1, Ordering::Relaxed);
        debug!("Stored {} as {}", info.path, hash);
        Ok(hash)
    }

    /// Fetch a file's current content by path.
    ///
    /// Resolves through the local path index first. On a miss the catalog
    /// is consulted and whatever the remote tier returns is written back
    /// into both the content cache and the path index. Remote failures
    /// degrade to `None`; local I/O failures are returned.
    ///
    /// The mapping is only repopulated if no writer changed it during the
    /// remote lookup; otherwise the newer mapping is served.
    pub async fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let resolved = self.index.resolve(path).await;
        if let Some(hash) = &resolved {
            if let Some(bytes) = self.content.get(hash).await? {
                return Ok(Some(bytes));
            }
            debug!("Mapping for {} points at missing content {}", path, hash);
        }

        let meta = match self.catalog.find_by_path(path).await {
            Ok(Some(meta)) => meta,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Catalog lookup failed for {}: {}", path, e);
                return Ok(None);
            }
        };

        let Some(bytes) = self.content.get(&meta.id).await? else {
            return Ok(None);
        };
        if self
            .index
            .compare_and_set(path, resolved.as_ref(), meta.id)
            .await?
        {
            debug!("Repopulated {} from remote", path);
            return Ok(Some(bytes));
        }

        // A store for this path completed while we were reading remotely
        match self.index.resolve(path).await {
            Some(current) => self.content.get(&current).await,
            None => Ok(None),
        }
    }

    /// Fetch a file and decode it as UTF-8, replacing invalid sequences.
    pub async fn get_file_string(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .get_file(path)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Number of successful `store_file` calls on this instance.
    pub fn get_file_count(&self) -> u64 {
        self.files_stored.load(Ordering::Relaxed)
    }

    /// Drop a local path mapping. Stored content and remote records stay.
    pub async fn forget_path(&self, path: &str) -> Result<Option<ContentHash>> {
        self.index.remove(path).await
    }

    /// Replace the local path table with the newest catalog record per path.
    ///
    /// Returns the number of mappings written.
    pub async fn rebuild_path_index(&self) -> Result<usize> {
        let latest = self.catalog.list_latest().await?;
        let count = latest.len();
        self.index
            .replace_all(latest.into_iter().map(|meta| (meta.path, meta.id)))
            .await?;
        info!("Rebuilt path index with {} entries", count);
        Ok(count)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Workspace
    // ─────────────────────────────────────────────────────────────────────────

    /// Save workspace metadata locally, then remotely.
    ///
    /// The local write is fatal on failure. A remote failure is logged and
    /// reported as [`RemoteSync::Pending`].
    pub async fn save_workspace_metadata(&self, meta: &WorkspaceMetadata) -> Result<RemoteSync> {
        let file = self.workspace_metadata_file();
        let json = serde_json::to_vec_pretty(meta)
            .map_err(|e| Error::serialization(file.display().to_string(), e))?;
        write_atomic(&file, &json, "write workspace metadata").await?;

        match self.catalog.upsert_workspace(meta).await {
            Ok(()) => Ok(RemoteSync::Synced),
            Err(e) => {
                warn!("Workspace metadata not replicated: {}", e);
                Ok(RemoteSync::Pending {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Read the local workspace metadata, if any has been saved.
    pub async fn load_workspace_metadata(&self) -> Result<Option<WorkspaceMetadata>> {
        let file = self.workspace_metadata_file();
        read_json(&file, "read workspace metadata").await
    }

    fn workspace_metadata_file(&self) -> PathBuf {
        self.config.cache_dir.join(WORKSPACE_METADATA_FILE)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Search
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
        self.catalog.search(query).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a task record locally, then upsert it remotely.
    ///
    /// Both halves are required: a remote failure is returned as an error
    /// after the local record has been written.
    pub async fn store_task_metadata(&self, task: &TaskMetadata) -> Result<()> {
        let file = self.task_file(&task.id)?;
        let json = serde_json::to_vec_pretty(task)
            .map_err(|e| Error::serialization(task.id.as_str(), e))?;
        write_atomic(&file, &json, "write task record").await?;

        self.catalog.upsert_task(task).await
    }

    /// Read a task record from the local tier.
    pub async fn load_task_metadata(&self, id: &str) -> Result<Option<TaskMetadata>> {
        let file = self.task_file(id)?;
        read_json(&file, "read task record").await
    }

    /// All locally recorded tasks, oldest first.
    pub async fn list_tasks(&self) -> Result<Vec<TaskMetadata>> {
        let dir = self.config.cache_dir.join(TASKS_DIR);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::local_io("list task records", &dir, e))?;

        let mut tasks = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::local_io("list task records", &dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<TaskMetadata>(&path, "read task record").await {
                Ok(Some(task)) => tasks.push(task),
                Ok(None) => {}
                Err(e) if e.is_local_io() => return Err(e),
                Err(e) => warn!("Skipping unreadable task record: {}", e),
            }
        }

        tasks.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn task_file(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidId(id.to_string()));
        }
        Ok(self
            .config
            .cache_dir
            .join(TASKS_DIR)
            .join(format!("{}.json", id)))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
    operation: &'static str,
) -> Result<Option<T>> {
    let Some(bytes) = read_optional(path, operation).await? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::serialization(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{DocumentQuery, FILES_COLLECTION, InMemoryRemote, RemoteResult};
    use crate::types::{Message, Role};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    async fn manager(dir: &TempDir, remote: Arc<InMemoryRemote>) -> MemoryManager {
        MemoryManager::new(MemoryConfig::new(dir.path().join("cache")), remote)
            .await
            .unwrap()
    }

    fn file(path: &str, content: &str, modified: &str) -> FileInfo {
        FileInfo::new(path, content, "ts", modified)
    }

    #[tokio::test]
    async fn test_store_then_get() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        let memory = manager(&dir, remote.clone()).await;

        let hash = memory.store_file(&file("src/a.ts", "export {}", "t0")).await.unwrap();
        assert_eq!(
            memory.get_file("src/a.ts").await.unwrap(),
            Some(b"export {}".to_vec())
        );
        assert_eq!(memory.get_file("src/missing.ts").await.unwrap(), None);
        assert_eq!(memory.path_index().resolve("src/a.ts").await, Some(hash.clone()));
        assert!(remote.get_blob(&hash.blob_key()).await.unwrap().is_some());
        assert_eq!(remote.document_count(FILES_COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn test_offline_store_then_get_uses_local_fast_path() {
        let dir = TempDir::new().unwrap();
        let memory = manager(&dir, Arc::new(InMemoryRemote::offline())).await;

        let info = FileInfo::new("a.ts", "x", "ts", "t0").with_hash(ContentHash::compute(b"x"));
        let err = memory.store_file(&info).await.unwrap_err();
        assert!(err.is_remote());
        assert!(err.to_string().contains("a.ts"));

        assert_eq!(memory.get_file_string("a.ts").await.unwrap().as_deref(), Some("x"));
        assert_eq!(memory.get_file_count(), 0);
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let memory = manager(&dir, Arc::new(InMemoryRemote::new())).await;

        let info = file("a.ts", "x", "t0").with_hash(ContentHash::compute(b"y"));
        let err = memory.store_file(&info).await.unwrap_err();
        assert!(matches!(err, Error::HashMismatch { .. }));
        assert_eq!(memory.get_file("a.ts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_path_aliasing_shares_content() {
        let dir = TempDir::new().unwrap();
        let memory = manager(&dir, Arc::new(InMemoryRemote::new())).await;

        let a = memory.store_file(&file("a.ts", "same", "t0")).await.unwrap();
        let b = memory.store_file(&file("b.ts", "same", "t0")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(memory.get_file("a.ts").await.unwrap(), memory.get_file("b.ts").await.unwrap());

        let content_files = std::fs::read_dir(memory.cache_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| ContentHash::parse(&entry.file_name().to_string_lossy()).is_ok())
            .count();
        assert_eq!(content_files, 1);

        memory.forget_path("a.ts").await.unwrap();
        assert_eq!(memory.get_file("a.ts").await.unwrap(), Some(b"same".to_vec()));
        assert_eq!(memory.get_file_string("b.ts").await.unwrap().as_deref(), Some("same"));
    }

    /// Remote that can hold one `query_documents` call after it has read
    /// its results, until released.
    #[derive(Default)]
    struct PausingRemote {
        inner: InMemoryRemote,
        armed: AtomicBool,
        paused: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RemoteStore for PausingRemote {
        async fn store_blob(&self, key: &str, bytes: &[u8]) -> RemoteResult<()> {
            self.inner.store_blob(key, bytes).await
        }

        async fn get_blob(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
            self.inner.get_blob(key).await
        }

        async fn store_document(&self, collection: &str, document: &serde_json::Value) -> RemoteResult<()> {
            self.inner.store_document(collection, document).await
        }

        async fn query_documents(
            &self,
            collection: &str,
            query: &DocumentQuery,
        ) -> RemoteResult<Vec<serde_json::Value>> {
            let documents = self.inner.query_documents(collection, query).await?;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.paused.notify_one();
                self.release.notified().await;
            }
            Ok(documents)
        }

        async fn search_code(&self, query: &str) -> RemoteResult<Vec<SearchMatch>> {
            self.inner.search_code(query).await
        }
    }

    #[tokio::test]
    async fn test_slow_read_does_not_roll_back_concurrent_store() {
        let remote = Arc::new(PausingRemote::default());

        let writer_dir = TempDir::new().unwrap();
        let writer = MemoryManager::new(MemoryConfig::new(writer_dir.path().join("cache")), remote.clone())
            .await
            .unwrap();
        writer.store_file(&file("x", "C1", "t1")).await.unwrap();

        let reader_dir = TempDir::new().unwrap();
        let reader = Arc::new(
            MemoryManager::new(MemoryConfig::new(reader_dir.path().join("cache")), remote.clone())
                .await
                .unwrap(),
        );

        remote.armed.store(true, Ordering::SeqCst);
        let slow_read = tokio::spawn({
            let reader = Arc::clone(&reader);
            async move { reader.get_file_string("x").await }
        });
        remote.paused.notified().await;

        let h2 = reader.store_file(&file("x", "C2", "t2")).await.unwrap();
        remote.release.notify_one();

        let read = slow_read.await.unwrap().unwrap();
        assert_eq!(read.as_deref(), Some("C2"));
        assert_eq!(reader.path_index().resolve("x").await, Some(h2));
        assert_eq!(reader.get_file_string("x").await.unwrap().as_deref(), Some("C2"));
    }

    #[tokio::test]
    async fn test_last_writer_wins_and_old_content_is_kept() {
        let dir = TempDir::new().unwrap();
        let memory = manager(&dir, Arc::new(InMemoryRemote::new())).await;

        let h1 = memory.store_file(&file("x", "C1", "t1")).await.unwrap();
        let h2 = memory.store_file(&file("x", "C2", "t2")).await.unwrap();

        assert_eq!(memory.path_index().resolve("x").await, Some(h2));
        assert_eq!(memory.content_store().get(&h1).await.unwrap(), Some(b"C1".to_vec()));
        assert_eq!(memory.get_file_string("x").await.unwrap().as_deref(), Some("C2"));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_file_locally() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        remote.fail_documents(true);
        let memory = manager(&dir, remote.clone()).await;

        let err = memory.store_file(&file("a.ts", "body", "t0")).await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(remote.blob_count().await, 1);
        assert_eq!(memory.get_file_string("a.ts").await.unwrap().as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn test_get_repopulates_from_remote_on_fresh_cache() {
        let remote = Arc::new(InMemoryRemote::new());

        let first = TempDir::new().unwrap();
        let writer = manager(&first, remote.clone()).await;
        let hash = writer.store_file(&file("lib/b.ts", "remote body", "t0")).await.unwrap();

        let second = TempDir::new().unwrap();
        let reader = manager(&second, remote.clone()).await;
        assert!(!reader.content_store().contains_local(&hash).await);

        assert_eq!(
            reader.get_file_string("lib/b.ts").await.unwrap().as_deref(),
            Some("remote body")
        );
        assert!(reader.content_store().contains_local(&hash).await);
        assert_eq!(reader.path_index().resolve("lib/b.ts").await, Some(hash));

        // Served locally once repopulated
        remote.set_offline(true);
        assert!(reader.get_file("lib/b.ts").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remote_failure_on_miss_is_not_found() {
        let dir = TempDir::new().unwrap();
        let memory = manager(&dir, Arc::new(InMemoryRemote::offline())).await;
        assert_eq!(memory.get_file("nowhere.ts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_counter_is_instance_scoped() {
        let remote = Arc::new(InMemoryRemote::new());
        let dir = TempDir::new().unwrap();
        let first = manager(&dir, remote.clone()).await;
        first.store_file(&file("a", "1", "t")).await.unwrap();
        first.store_file(&file("b", "2", "t")).await.unwrap();
        assert_eq!(first.get_file_count(), 2);

        let second = manager(&dir, remote.clone()).await;
        assert_eq!(second.get_file_count(), 0);
        second.store_file(&file("c", "3", "t")).await.unwrap();
        assert_eq!(second.get_file_count(), 1);
        assert_eq!(first.get_file_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_stores_keep_every_mapping() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(manager(&dir, Arc::new(InMemoryRemote::new())).await);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let memory = Arc::clone(&memory);
                tokio::spawn(async move {
                    memory
                        .store_file(&FileInfo::new(format!("f{}.ts", i), format!("body {}", i), "ts", "t"))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(memory.get_file_count(), 32);
        let reopened = PathIndex::open(memory.cache_dir()).await.unwrap();
        assert_eq!(reopened.len().await, 32);
    }

    #[tokio::test]
    async fn test_workspace_metadata_sync_states() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        let memory = manager(&dir, remote.clone()).await;
        assert_eq!(memory.load_workspace_metadata().await.unwrap(), None);

        let meta = WorkspaceMetadata {
            path: "/ws".into(),
            last_indexed: "2024-05-01T00:00:00Z".into(),
            file_count: 4,
        };
        assert_eq!(memory.save_workspace_metadata(&meta).await.unwrap(), RemoteSync::Synced);

        remote.set_offline(true);
        let newer = WorkspaceMetadata {
            file_count: 5,
            ..meta
        };
        let sync = memory.save_workspace_metadata(&newer).await.unwrap();
        assert!(!sync.is_synced());
        assert_eq!(memory.load_workspace_metadata().await.unwrap(), Some(newer));
    }

    #[tokio::test]
    async fn test_search_failure_names_query() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        let memory = manager(&dir, remote.clone()).await;
        memory.store_file(&file("auth.ts", "login()", "t")).await.unwrap();

        let found = memory.search("login").await.unwrap();
        assert_eq!(found[0].path, "auth.ts");

        remote.set_offline(true);
        let err = memory.search("login").await.unwrap_err();
        assert!(err.to_string().contains("login"));
    }

    #[tokio::test]
    async fn test_task_records_round_trip() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        let memory = manager(&dir, remote.clone()).await;

        let task = TaskMetadata {
            id: "task-1".into(),
            title: "Fix login".into(),
            timestamp: 10,
            messages: vec![Message {
                role: Role::User,
                content: "Fix login".into(),
                timestamp: 11,
            }],
            complete: false,
        };
        memory.store_task_metadata(&task).await.unwrap();
        assert_eq!(memory.load_task_metadata("task-1").await.unwrap(), Some(task.clone()));
        assert_eq!(memory.load_task_metadata("task-2").await.unwrap(), None);
        assert_eq!(memory.list_tasks().await.unwrap(), vec![task.clone()]);

        let docs = remote
            .query_documents(crate::remote::TASKS_COLLECTION, &DocumentQuery::all())
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);

        assert!(matches!(
            memory.load_task_metadata("../escape").await,
            Err(Error::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_rebuild_and_forget_path() {
        let dir = TempDir::new().unwrap();
        let memory = manager(&dir, Arc::new(InMemoryRemote::new())).await;
        memory.store_file(&file("a.ts", "a1", "1")).await.unwrap();
        let a2 = memory.store_file(&file("a.ts", "a2", "2")).await.unwrap();
        memory.store_file(&file("b.ts", "b", "1")).await.unwrap();

        assert!(memory.forget_path("a.ts").await.unwrap().is_some());
        assert_eq!(memory.path_index().resolve("a.ts").await, None);

        assert_eq!(memory.rebuild_path_index().await.unwrap(), 2);
        assert_eq!(memory.path_index().resolve("a.ts").await, Some(a2));
    }
}
