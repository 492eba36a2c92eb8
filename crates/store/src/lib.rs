//! Storage layer for the unfair-wheel backend.
//!
//! Two independent concerns live here:
//! - [`MetadataStore`]: the flat key→string store backing cross-group
//!   indices (group records, ownership and email membership keys,
//!   bookmarks). Writes are last-write-wins and eventually consistent.
//! - [`checkpoint::CheckpointStore`]: best-effort per-group state snapshots
//!   used to revive group actors after a restart.

pub mod checkpoint;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use memory::MemoryMetadataStore;

/// Storage failure. Callers in the router treat these as non-fatal: the
/// index is advisory and converges on later writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}

/// Flat key→string store with prefix scans.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists all entries whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}
