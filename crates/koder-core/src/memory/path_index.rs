//! Local path → hash index.
//!
//! The whole table lives in memory behind a `tokio::sync::Mutex` and is
//! rewritten to `path_mappings.json` on every mutation. The lock is held
//! across the read-modify-write-persist cycle, so concurrent writers never
//! drop each other's entries.
//!
//! The index is a convenience cache: a missing or corrupt table starts
//! empty and can be rebuilt from the metadata catalog.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::warn;

use super::{PATH_MAPPINGS_FILE, read_optional, write_atomic};
use crate::error::{Error, Result};
use crate::types::ContentHash;

/// Persistent path → content hash table
pub struct PathIndex {
    file: PathBuf,
    table: Mutex<BTreeMap<String, ContentHash>>,
}

impl PathIndex {
    /// Load the index from a cache directory
    pub async fn open(cache_dir: &Path) -> Result<Self> {
        let file = cache_dir.join(PATH_MAPPINGS_FILE);
        let table = match read_optional(&file, "read path mappings").await? {
            Some(bytes) => Self::decode(&file, &bytes),
            None => BTreeMap::new(),
        };

        Ok(Self {
            file,
            table: Mutex::new(table),
        })
    }

    fn decode(file: &Path, bytes: &[u8]) -> BTreeMap<String, ContentHash> {
        let raw: BTreeMap<String, String> = match serde_json::from_slice(bytes) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ignoring unreadable path mappings at {}: {}", file.display(), e);
                return BTreeMap::new();
            }
        };

        raw.into_iter()
            .filter_map(|(path, hash)| match ContentHash::parse(&hash) {
                Ok(hash) => Some((path, hash)),
                Err(_) => {
                    warn!("Dropping mapping for {} with invalid hash {}", path, hash);
                    None
                }
            })
            .collect()
    }

    /// File holding the persisted table
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Map a path to a hash and persist the table before returning.
    ///
    /// If the table cannot be written the in-memory entry is rolled back.
    pub async fn set(&self, path: &str, hash: ContentHash) -> Result<()> {
        let mut table = self.table.lock().await;
        self.insert_persisted(&mut table, path, hash).await
    }

    /// Map a path to a hash only if its current mapping is still `expected`.
    ///
    /// Returns `false`, leaving the table untouched, when another writer got
    /// there first.
    pub async fn compare_and_set(
        &self,
        path: &str,
        expected: Option<&ContentHash>,
        hash: ContentHash,
    ) -> Result<bool> {
        let mut table = self.table.lock().await;
        if table.get(path) != expected {
            return Ok(false);
        }
        self.insert_persisted(&mut table, path, hash).await?;
        Ok(true)
    }

    /// Current hash for a path.
    pub async fn resolve(&self, path: &str) -> Option<ContentHash> {
        self.table.lock().await.get(path).cloned()
    }

    /// Drop a path's mapping. Content is untouched.
    pub async fn remove(&self, path: &str) -> Result<Option<ContentHash>> {
        let mut table = self.table.lock().await;
        let Some(removed) = table.remove(path) else {
            return Ok(None);
        };

        if let Err(e) = self.persist(&table).await {
            table.insert(path.to_string(), removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    /// Replace the whole table, e.g. after a rebuild from the catalog.
    pub async fn replace_all(&self, entries: impl IntoIterator<Item = (String, ContentHash)>) -> Result<()> {
        let replacement: BTreeMap<String, ContentHash> = entries.into_iter().collect();
        let mut table = self.table.lock().await;
        self.persist(&replacement).await?;
        *table = replacement;
        Ok(())
    }

    /// Snapshot of all entries, ordered by path.
    pub async fn entries(&self) -> Vec<(String, ContentHash)> {
        self.table
            .lock()
            .await
            .iter()
            .map(|(p, h)| (p.clone(), h.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }

    async fn insert_persisted(
        &self,
        table: &mut BTreeMap<String, ContentHash>,
        path: &str,
        hash: ContentHash,
    ) -> Result<()> {
        let previous = table.insert(path.to_string(), hash);

        if let Err(e) = self.persist(table).await {
            match previous {
                Some(old) => table.insert(path.to_string(), old),
                None => table.remove(path),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self, table: &BTreeMap<String, ContentHash>) -> Result<()> {
        let json = serde_json::to_vec_pretty(table)
            .map_err(|e| Error::serialization(self.file.display().to_string(), e))?;
        write_atomic(&self.file, &json, "write path mappings").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_and_resolve_persist() {
        let dir = TempDir::new().unwrap();
        let hash = ContentHash::compute(b"a");

        let index = PathIndex::open(dir.path()).await.unwrap();
        assert!(index.is_empty().await);
        index.set("src/a.ts", hash.clone()).await.unwrap();
        assert_eq!(index.resolve("src/a.ts").await, Some(hash.clone()));
        assert_eq!(index.resolve("src/b.ts").await, None);

        let reopened = PathIndex::open(dir.path()).await.unwrap();
        assert_eq!(reopened.resolve("src/a.ts").await, Some(hash));
    }

    #[tokio::test]
    async fn test_table_is_plain_json_object() {
        let dir = TempDir::new().unwrap();
        let hash = ContentHash::compute(b"a");
        let index = PathIndex::open(dir.path()).await.unwrap();
        index.set("a.ts", hash.clone()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(PATH_MAPPINGS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["a.ts"], hash.as_str());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open(dir.path()).await.unwrap();
        let h1 = ContentHash::compute(b"1");
        let h2 = ContentHash::compute(b"2");

        index.set("x", h1).await.unwrap();
        index.set("x", h2.clone()).await.unwrap();
        assert_eq!(index.resolve("x").await, Some(h2));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_no_updates() {
        let dir = TempDir::new().unwrap();
        let index = Arc::new(PathIndex::open(dir.path()).await.unwrap());

        let writers = 64;
        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let index = Arc::clone(&index);
                tokio::spawn(async move {
                    let hash = ContentHash::compute(format!("content-{}", i).as_bytes());
                    index.set(&format!("file-{}.rs", i), hash).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(index.len().await, writers);
        let reopened = PathIndex::open(dir.path()).await.unwrap();
        assert_eq!(reopened.len().await, writers);
        for i in 0..writers {
            let expected = ContentHash::compute(format!("content-{}", i).as_bytes());
            assert_eq!(reopened.resolve(&format!("file-{}.rs", i)).await, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_compare_and_set_respects_newer_writer() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open(dir.path()).await.unwrap();
        let stale = ContentHash::compute(b"stale");
        let fresh = ContentHash::compute(b"fresh");

        assert!(index.compare_and_set("x", None, stale.clone()).await.unwrap());
        index.set("x", fresh.clone()).await.unwrap();

        assert!(!index.compare_and_set("x", None, stale.clone()).await.unwrap());
        assert!(!index.compare_and_set("x", Some(&stale), stale.clone()).await.unwrap());
        assert_eq!(index.resolve("x").await, Some(fresh.clone()));

        let reopened = PathIndex::open(dir.path()).await.unwrap();
        assert_eq!(reopened.resolve("x").await, Some(fresh));
    }

    #[tokio::test]
    async fn test_remove_leaves_other_paths() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open(dir.path()).await.unwrap();
        let hash = ContentHash::compute(b"shared");
        index.set("a", hash.clone()).await.unwrap();
        index.set("b", hash.clone()).await.unwrap();

        assert_eq!(index.remove("a").await.unwrap(), Some(hash.clone()));
        assert_eq!(index.remove("a").await.unwrap(), None);
        assert_eq!(index.resolve("b").await, Some(hash));
    }

    #[tokio::test]
    async fn test_corrupt_table_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PATH_MAPPINGS_FILE), b"{ not json").unwrap();
        let index = PathIndex::open(dir.path()).await.unwrap();
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_hashes_are_dropped() {
        let dir = TempDir::new().unwrap();
        let good = ContentHash::compute(b"ok");
        let raw = serde_json::json!({ "good": good.as_str(), "bad": "../../etc/passwd" });
        std::fs::write(dir.path().join(PATH_MAPPINGS_FILE), raw.to_string()).unwrap();

        let index = PathIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.entries().await, vec![("good".to_string(), good)]);
    }

    #[tokio::test]
    async fn test_replace_all() {
        let dir = TempDir::new().unwrap();
        let index = PathIndex::open(dir.path()).await.unwrap();
        index.set("old", ContentHash::compute(b"old")).await.unwrap();

        let fresh = ContentHash::compute(b"new");
        index
            .replace_all(vec![("new".to_string(), fresh.clone())])
            .await
            .unwrap();
        assert_eq!(index.resolve("old").await, None);
        assert_eq!(index.resolve("new").await, Some(fresh));
    }
}
