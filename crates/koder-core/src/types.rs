//! Shared types for koder-core.
//!
//! These types are used by the memory layer, the remote stores and the
//! binaries. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Content Addressing
// ─────────────────────────────────────────────────────────────────────────────

/// Lowercase hex SHA-256 digest of a byte sequence.
///
/// A hash doubles as a local cache file name, so parsing rejects anything
/// that is not exactly 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of a hex-encoded SHA-256 digest.
    pub const LEN: usize = 64;

    /// Compute the identifier for a byte sequence.
    pub fn compute(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse and validate a hex digest.
    pub fn parse(value: &str) -> Result<Self> {
        let valid = value.len() == Self::LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::InvalidHash(value.to_string()))
        }
    }

    /// Check whether `content` hashes to this identifier.
    pub fn matches(&self, content: &[u8]) -> bool {
        Self::compute(content) == *self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the content is stored in the remote blob store.
    pub fn blob_key(&self) -> String {
        format!("files/{}", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Records
// ─────────────────────────────────────────────────────────────────────────────

/// A file presented for storage.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Workspace-relative logical path
    pub path: String,
    pub content: Vec<u8>,
    /// Caller-supplied modification timestamp
    pub last_modified: String,
    pub file_type: String,
    /// Optional caller-computed hash, validated against the content
    pub hash: Option<ContentHash>,
}

impl FileInfo {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
        file_type: impl Into<String>,
        last_modified: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            last_modified: last_modified.into(),
            file_type: file_type.into(),
            hash: None,
        }
    }

    /// Attach a caller-computed hash.
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.hash = Some(hash);
        self
    }
}

/// Descriptive metadata for one stored content value, keyed by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Content hash of the described bytes
    pub id: ContentHash,
    pub path: String,
    pub last_modified: String,
    pub file_type: String,
    /// Byte length of the content addressed by `id`
    pub size: u64,
}

impl FileMetadata {
    pub fn describe(info: &FileInfo, hash: ContentHash) -> Self {
        Self {
            id: hash,
            path: info.path.clone(),
            last_modified: info.last_modified.clone(),
            file_type: info.file_type.clone(),
            size: info.content.len() as u64,
        }
    }
}

/// Workspace-level indexing summary; one per workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMetadata {
    /// Workspace root
    pub path: String,
    pub last_indexed: String,
    pub file_count: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Task Records
// ─────────────────────────────────────────────────────────────────────────────

/// Author of a task message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub id: String,
    pub title: String,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    pub messages: Vec<Message>,
    pub complete: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Versioned Remote Documents
// ─────────────────────────────────────────────────────────────────────────────

/// Current schema version written into every remote document.
pub const SCHEMA_VERSION: u32 = 1;

/// Closed set of records the memory layer writes to the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    File(FileMetadata),
    Workspace(WorkspaceDocument),
    Task(TaskMetadata),
}

/// Workspace metadata under its fixed document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceDocument {
    pub id: String,
    #[serde(flatten)]
    pub metadata: WorkspaceMetadata,
}

impl WorkspaceDocument {
    pub const ID: &'static str = "workspace";

    pub fn new(metadata: WorkspaceMetadata) -> Self {
        Self {
            id: Self::ID.to_string(),
            metadata,
        }
    }
}

/// Envelope carrying the schema version alongside a tagged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub schema: u32,
    #[serde(flatten)]
    pub record: Record,
}

impl VersionedRecord {
    pub fn new(record: Record) -> Self {
        Self {
            schema: SCHEMA_VERSION,
            record,
        }
    }

    /// Document identifier of the wrapped record.
    pub fn id(&self) -> &str {
        match &self.record {
            Record::File(meta) => meta.id.as_str(),
            Record::Workspace(doc) => &doc.id,
            Record::Task(task) => &task.id,
        }
    }

    pub fn to_document(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::serialization(self.id(), e))
    }

    /// Decode a document, rejecting unknown kinds and schema versions.
    pub fn from_document(document: serde_json::Value) -> Result<Self> {
        let id = document
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("<unknown>")
            .to_string();
        let record: Self =
            serde_json::from_value(document).map_err(|e| Error::serialization(&id, e))?;
        if record.schema != SCHEMA_VERSION {
            return Err(Error::serialization(
                id,
                serde::de::Error::custom(format!(
                    "unsupported schema version {} (expected {})",
                    record.schema, SCHEMA_VERSION
                )),
            ));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = ContentHash::compute(b"hello");
        let b = ContentHash::compute(b"hello");
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(a, ContentHash::compute(b"hello!"));
        assert!(a.matches(b"hello"));
    }

    #[test]
    fn test_hash_parse_rejects_non_digests() {
        assert!(ContentHash::parse("../../etc/passwd").is_err());
        assert!(ContentHash::parse("ABCDEF").is_err());
        let upper = ContentHash::compute(b"x").as_str().to_uppercase();
        assert!(ContentHash::parse(&upper).is_err());
        let hash = ContentHash::compute(b"x");
        assert_eq!(ContentHash::parse(hash.as_str()).unwrap(), hash);
    }

    #[test]
    fn test_file_record_document_shape() {
        let hash = ContentHash::compute(b"x");
        let meta = FileMetadata {
            id: hash.clone(),
            path: "a.ts".into(),
            last_modified: "t0".into(),
            file_type: "ts".into(),
            size: 1,
        };
        let doc = VersionedRecord::new(Record::File(meta.clone()))
            .to_document()
            .unwrap();
        assert_eq!(doc["schema"], 1);
        assert_eq!(doc["kind"], "file");
        assert_eq!(doc["id"], hash.as_str());
        assert_eq!(doc["lastModified"], "t0");
        assert_eq!(doc["fileType"], "ts");

        let decoded = VersionedRecord::from_document(doc).unwrap();
        assert_eq!(decoded.record, Record::File(meta));
    }

    #[test]
    fn test_workspace_document_uses_fixed_id() {
        let doc = VersionedRecord::new(Record::Workspace(WorkspaceDocument::new(
            WorkspaceMetadata {
                path: "/ws".into(),
                last_indexed: "2024-01-01T00:00:00Z".into(),
                file_count: 3,
            },
        )))
        .to_document()
        .unwrap();
        assert_eq!(doc["id"], "workspace");
        assert_eq!(doc["fileCount"], 3);
    }

    #[test]
    fn test_unknown_schema_is_rejected() {
        let doc = serde_json::json!({
            "schema": 99,
            "kind": "task",
            "id": "t1",
            "title": "x",
            "timestamp": 0,
            "messages": [],
            "complete": false
        });
        assert!(VersionedRecord::from_document(doc).is_err());

        let loose = serde_json::json!({ "id": "t1", "whatever": true });
        assert!(VersionedRecord::from_document(loose).is_err());
    }
}
