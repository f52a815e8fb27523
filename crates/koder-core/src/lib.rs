//! koder-core - Core library for Koder
//!
//! This crate provides the hybrid workspace memory shared by the koder CLI
//! and koder-server:
//!
//! - **memory**: content store, path index, metadata catalog and the
//!   `MemoryManager` that composes them across the local and remote tiers
//! - **remote**: the remote tier contract and its in-memory, SQLite and HTTP
//!   implementations
//! - **task**: task ledger persisted through the memory manager
//! - **indexer**: walks a workspace and stores its files
//! - **config**: explicit memory and remote configuration

pub mod config;
pub mod error;
pub mod indexer;
pub mod memory;
pub mod remote;
pub mod task;
pub mod types;

// Re-export commonly used types
pub use config::{MemoryConfig, RemoteConfig};
pub use error::{Error, Result};
pub use memory::{MemoryManager, RemoteSync};
pub use remote::{InMemoryRemote, RemoteStore};
pub use task::Task;
pub use types::{ContentHash, FileInfo, FileMetadata, TaskMetadata, WorkspaceMetadata};
