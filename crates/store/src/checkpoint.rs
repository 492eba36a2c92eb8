//! Best-effort group state checkpoints.
//!
//! Actors serialize their full state after every mutating transaction and
//! hand the JSON here. A lost or failed checkpoint costs at most the latest
//! transaction on restart; it never fails the client request.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::StoreError;

/// Persists and restores per-group state snapshots, keyed by group id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, group_id: &str, state_json: &str) -> Result<(), StoreError>;

    async fn load(&self, group_id: &str) -> Result<Option<String>, StoreError>;
}

/// Checkpoints as one JSON file per group under a base directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, group_id: &str) -> PathBuf {
        self.dir.join(format!("{group_id}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, group_id: &str, state_json: &str) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        // Temp file + rename: a torn write must not clobber the last snapshot.
        let tmp = self.dir.join(format!("{group_id}.json.tmp"));
        tokio::fs::write(&tmp, state_json).await?;
        tokio::fs::rename(&tmp, self.path_for(group_id)).await?;
        Ok(())
    }

    async fn load(&self, group_id: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(group_id)).await {
            Ok(json) => Ok(Some(json)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory checkpoint store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    snapshots: RwLock<HashMap<String, String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, group_id: &str, state_json: &str) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .await
            .insert(group_id.to_string(), state_json.to_string());
        Ok(())
    }

    async fn load(&self, group_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.snapshots.read().await.get(group_id).cloned())
    }
}
