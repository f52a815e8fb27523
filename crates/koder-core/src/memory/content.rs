//! Content store: hash-addressed bytes in both tiers.
//!
//! Local writes are fatal on failure. Remote replication is best effort:
//! failures are logged and never retried here. Reads prefer the local tier
//! and repopulate it from the remote tier on a miss.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{read_optional, write_atomic};
use crate::error::{Error, Result};
use crate::remote::RemoteStore;
use crate::types::ContentHash;

/// Two-tier content-addressed byte store
pub struct ContentStore {
    root: PathBuf,
    remote: Arc<dyn RemoteStore>,
}

impl ContentStore {
    /// Create a store over an existing cache directory
    pub fn new(root: impl Into<PathBuf>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            root: root.into(),
            remote,
        }
    }

    /// Cache directory holding the content files
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local file holding the content for a hash
    pub fn local_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.as_str())
    }

    /// Store bytes in both tiers, returning their identifier.
    pub async fn put(&self, content: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::compute(content);
        self.put_hashed(&hash, content).await?;
        Ok(hash)
    }

    /// Store bytes whose hash the caller has already computed.
    pub(crate) async fn put_hashed(&self, hash: &ContentHash, content: &[u8]) -> Result<()> {
        self.write_local(hash, content).await?;

        if let Err(e) = self.remote.store_blob(&hash.blob_key(), content).await {
            warn!("Failed to replicate content {} to remote: {}", hash, e);
        }
        Ok(())
    }

    /// Fetch bytes by hash, falling back to the remote tier.
    ///
    /// A remote hit is verified against the hash and written into the local
    /// tier before it is returned. Remote failures are treated as a miss.
    pub async fn get(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = self.get_local(hash).await? {
            debug!("Content {} served from local cache", hash);
            return Ok(Some(bytes));
        }

        let bytes = match self.remote.get_blob(&hash.blob_key()).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Failed to fetch content {} from remote: {}", hash, e);
                return Ok(None);
            }
        };

        if !hash.matches(&bytes) {
            warn!("Remote content for {} does not match its hash, ignoring", hash);
            return Ok(None);
        }

        self.write_local(hash, &bytes).await?;
        debug!("Content {} repopulated from remote", hash);
        Ok(Some(bytes))
    }

    /// Fetch bytes from the local tier only.
    ///
    /// A cached file whose bytes no longer match its hash is treated as a
    /// miss.
    pub async fn get_local(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        let Some(bytes) = read_optional(&self.local_path(hash), "read cached content").await? else {
            return Ok(None);
        };
        if !hash.matches(&bytes) {
            warn!("Cached content for {} does not match its hash, ignoring", hash);
            return Ok(None);
        }
        Ok(Some(bytes))
    }

    /// Check whether the local tier holds a hash.
    pub async fn contains_local(&self, hash: &ContentHash) -> bool {
        tokio::fs::try_exists(self.local_path(hash))
            .await
            .unwrap_or(false)
    }

    /// Drop a hash from the local tier. Returns whether it was present.
    pub async fn remove_local(&self, hash: &ContentHash) -> Result<bool> {
        let path = self.local_path(hash);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::local_io("remove cached content", path, e)),
        }
    }

    async fn write_local(&self, hash: &ContentHash, content: &[u8]) -> Result<()> {
        let path = self.local_path(hash);

        if let Ok(existing) = tokio::fs::read(&path).await {
            if hash.matches(&existing) {
                return Ok(());
            }
        }

        write_atomic(&path, content, "write cached content").await
    }
}
