//! Workspace indexer.
//!
//! Walks a workspace root, stores every eligible text file through the
//! [`MemoryManager`] under its root-relative path, and records the
//! workspace summary. Failures on individual files are collected into the
//! [`IndexReport`] instead of aborting the walk.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::memory::{MemoryManager, RemoteSync};
use crate::types::{FileInfo, WorkspaceMetadata};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// A file selected for indexing.
#[derive(Debug, Clone)]
pub struct WorkspaceFile {
    pub absolute: PathBuf,
    /// Root-relative, `/`-separated
    pub relative: String,
    pub size: u64,
    pub last_modified: String,
}

/// Per-file failure
#[derive(Debug, Clone)]
pub struct IndexError {
    pub path: String,
    pub message: String,
}

/// Files found by a walk, before anything is stored.
#[derive(Debug, Default)]
pub struct WorkspaceScan {
    pub files: Vec<WorkspaceFile>,
    pub skipped_large: usize,
    pub errors: Vec<IndexError>,
}

/// Outcome of indexing a workspace.
#[derive(Debug)]
pub struct IndexReport {
    pub root: PathBuf,
    pub files_stored: u64,
    pub skipped_large: usize,
    pub skipped_binary: usize,
    pub errors: Vec<IndexError>,
    pub workspace_sync: RemoteSync,
}

/// Indexes a workspace directory into memory
pub struct Indexer<'a> {
    memory: &'a MemoryManager,
}

impl<'a> Indexer<'a> {
    pub fn new(memory: &'a MemoryManager) -> Self {
        Self { memory }
    }

    /// Walk the root and collect candidate files.
    ///
    /// Hidden entries, `target`, `node_modules` and the memory cache itself
    /// are skipped, as are files above the configured size limit.
    pub async fn scan(&self, root: &Path) -> Result<WorkspaceScan> {
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| Error::local_io("open workspace root", root, e))?;
        let cache_dir = tokio::fs::canonicalize(self.memory.cache_dir())
            .await
            .unwrap_or_else(|_| self.memory.cache_dir().to_path_buf());
        let max_bytes = self.memory.config().max_file_bytes;

        let walk_root = root.clone();
        tokio::task::spawn_blocking(move || walk(&walk_root, &cache_dir, max_bytes))
            .await
            .map_err(|e| Error::local_io("walk workspace", root, std::io::Error::other(e)))
    }

    /// Store scanned files, calling `on_file` after each one, then save the
    /// workspace summary.
    pub async fn index(
        &self,
        root: &Path,
        scan: WorkspaceScan,
        mut on_file: impl FnMut(&WorkspaceFile),
    ) -> Result<IndexReport> {
        let mut report = IndexReport {
            root: root.to_path_buf(),
            files_stored: 0,
            skipped_large: scan.skipped_large,
            skipped_binary: 0,
            errors: scan.errors,
            workspace_sync: RemoteSync::Synced,
        };

        for file in &scan.files {
            match self.index_file(file).await {
                Ok(true) => report.files_stored += 1,
                Ok(false) => report.skipped_binary += 1,
                Err(e) => report.errors.push(IndexError {
                    path: file.relative.clone(),
                    message: e.to_string(),
                }),
            }
            on_file(file);
        }

        let meta = WorkspaceMetadata {
            path: root.display().to_string(),
            last_indexed: Utc::now().to_rfc3339(),
            file_count: report.files_stored,
        };
        report.workspace_sync = self.memory.save_workspace_metadata(&meta).await?;

        tracing::info!(
            "Indexed {}: {} stored, {} too large, {} binary, {} errors",
            root.display(),
            report.files_stored,
            report.skipped_large,
            report.skipped_binary,
            report.errors.len()
        );
        Ok(report)
    }

    /// Scan and index in one step.
    pub async fn index_workspace(&self, root: &Path) -> Result<IndexReport> {
        let scan = self.scan(root).await?;
        self.index(root, scan, |_| {}).await
    }

    /// Returns `false` for non-UTF-8 content, which is not stored.
    async fn index_file(&self, file: &WorkspaceFile) -> Result<bool> {
        let bytes = tokio::fs::read(&file.absolute)
            .await
            .map_err(|e| Error::local_io("read workspace file", &file.absolute, e))?;
        if std::str::from_utf8(&bytes).is_err() {
            tracing::debug!("Skipping non-UTF-8 file {}", file.relative);
            return Ok(false);
        }

        let file_type = Path::new(&file.relative)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let info = FileInfo::new(&file.relative, bytes, file_type, &file.last_modified);
        self.memory.store_file(&info).await?;
        Ok(true)
    }
}

fn walk(root: &Path, cache_dir: &Path, max_bytes: u64) -> WorkspaceScan {
    let mut scan = WorkspaceScan::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.')
                && !SKIPPED_DIRS.contains(&&*name)
                && e.path() != cache_dir
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                tracing::warn!("Failed to walk {}: {}", path, e);
                scan.errors.push(IndexError {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                scan.errors.push(IndexError {
                    path: relative,
                    message: e.to_string(),
                });
                continue;
            }
        };
        if metadata.len() > max_bytes {
            scan.skipped_large += 1;
            continue;
        }

        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now())
            .to_rfc3339();

        scan.files.push(WorkspaceFile {
            absolute: entry.path().to_path_buf(),
            relative,
            size: metadata.len(),
            last_modified,
        });
    }

    scan
}
