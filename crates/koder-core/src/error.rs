//! Error types for koder-core.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using koder-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for memory operations
#[derive(Error, Debug)]
pub enum Error {
    // Local tier errors
    #[error("Local I/O error during {operation} on {}: {source}", path.display())]
    LocalIo {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Remote tier errors
    #[error("Remote error during {operation} for {target}: {source}")]
    Remote {
        operation: &'static str,
        target: String,
        #[source]
        source: RemoteError,
    },

    // Addressing errors
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    #[error("Content hash mismatch for {path}: expected {expected}, computed {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid record id: {0}")]
    InvalidId(String),

    // Task ledger errors
    #[error("Task already complete: {0}")]
    TaskAlreadyComplete(String),

    // Serialization errors
    #[error("Serialization error for {target}: {source}")]
    Serialization {
        target: String,
        #[source]
        source: serde_json::Error,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a local I/O error for an operation on a path
    pub fn local_io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::LocalIo {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Create a remote error for an operation on a target (path, hash, key, query)
    pub fn remote(operation: &'static str, target: impl Into<String>, source: RemoteError) -> Self {
        Self::Remote {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Create a serialization error for a target
    pub fn serialization(target: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            target: target.into(),
            source,
        }
    }

    /// Check if this error came from the remote tier
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Check if this error came from the local tier
    pub fn is_local_io(&self) -> bool {
        matches!(self, Self::LocalIo { .. })
    }
}
