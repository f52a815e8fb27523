//! SQLite-backed remote store.
//!
//! A single database file holds blobs and documents. Used directly by the
//! CLI as a durable remote tier and as the backend of `koder-server`.
//!
//! Thread-safe via internal Mutex. All database operations acquire the lock.

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

use super::{
    DocumentQuery, FILES_COLLECTION, RemoteError, RemoteResult, RemoteStore, document_id,
    latest_file_documents, rank, score_file,
};
use crate::types::SearchMatch;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS blobs (
        key   TEXT PRIMARY KEY,
        bytes BLOB NOT NULL
    );
    CREATE TABLE IF NOT EXISTS documents (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        id         TEXT NOT NULL,
        body       TEXT NOT NULL,
        UNIQUE (collection, id)
    );
";

/// SQLite remote store
pub struct SqliteRemote {
    conn: Mutex<Connection>,
}

impl SqliteRemote {
    /// Open (or create) the store at a path
    pub fn open(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_error)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_error)?;
        Self::init(conn)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> RemoteResult<Self> {
        Self::init(Connection::open_in_memory().map_err(db_error)?)
    }

    fn init(conn: Connection) -> RemoteResult<Self> {
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Check database connectivity
    pub fn ping(&self) -> RemoteResult<()> {
        let conn = self.lock()?;
        conn.execute_batch("SELECT 1").map_err(db_error)
    }

    fn lock(&self) -> RemoteResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RemoteError::unavailable("database lock poisoned"))
    }

    fn blob(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        conn.query_row("SELECT bytes FROM blobs WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(db_error)
    }

    fn documents(&self, collection: &str) -> RemoteResult<Vec<serde_json::Value>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY seq")
            .map_err(db_error)?;
        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))
            .map_err(db_error)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_error)?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(|e| RemoteError::decode(e.to_string())))
            .collect()
    }
}

fn db_error(e: rusqlite::Error) -> RemoteError {
    RemoteError::unavailable(format!("database error: {}", e))
}

#[async_trait]
impl RemoteStore for SqliteRemote {
    async fn store_blob(&self, key: &str, bytes: &[u8]) -> RemoteResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO blobs (key, bytes) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET bytes = excluded.bytes",
            params![key, bytes],
        )
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> RemoteResult<Option<Vec<u8>>> {
        self.blob(key)
    }

    async fn store_document(&self, collection: &str, document: &serde_json::Value) -> RemoteResult<()> {
        let id = document_id(document)?;
        let conn = self.lock()?;
        // REPLACE deletes the old row, so the document takes a fresh seq
        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id, document.to_string()],
        )
        .map_err(db_error)?;
        Ok(())
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> RemoteResult<Vec<serde_json::Value>> {
        Ok(self
            .documents(collection)?
            .into_iter()
            .filter(|d| query.matches(d))
            .collect())
    }

    async fn search_code(&self, query: &str) -> RemoteResult<Vec<SearchMatch>> {
        let files = self.documents(FILES_COLLECTION)?;
        let mut matches = Vec::new();
        for (path, key) in latest_file_documents(files) {
            if let Some(content) = self.blob(&key)? {
                if let Some(m) = score_file(&path, &String::from_utf8_lossy(&content), query) {
                    matches.push(m);
                }
            }
        }
        Ok(rank(matches))
    }
}
