//! Group id → actor handle registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use domain::error::DomainError;
use domain::group::Group;
use store::CheckpointStore;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::GroupActor;
use crate::config::EngineConfig;
use crate::state::GroupState;
use crate::GroupHandle;

/// The verified identity creating a group, as consumed from the resolver.
#[derive(Debug, Clone)]
pub struct OwnerIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
}

/// Owns every live group actor in the process. Groups persist indefinitely:
/// a handle, once created, stays registered, and groups not seen since the
/// last restart are revived from their checkpoint on first access.
pub struct GroupRegistry {
    groups: RwLock<HashMap<Uuid, GroupHandle>>,
    config: EngineConfig,
    checkpoint: Arc<dyn CheckpointStore>,
}

impl GroupRegistry {
    pub fn new(config: EngineConfig, checkpoint: Arc<dyn CheckpointStore>) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            config,
            checkpoint,
        }
    }

    /// Creates a group owned by `owner` and spawns its actor.
    pub async fn create_group(
        &self,
        name: &str,
        owner: OwnerIdentity,
    ) -> Result<Group, DomainError> {
        let state = GroupState::create(
            name,
            owner.user_id,
            &owner.email,
            &owner.display_name,
            Utc::now(),
        )?;
        let group = state.group.clone();

        // Checkpoint up front so a restart before the first mutation still
        // knows the group.
        match serde_json::to_string(&state) {
            Ok(json) => {
                if let Err(err) = self.checkpoint.save(&group.id.to_string(), &json).await {
                    warn!(group_id = %group.id, error = %err, "initial checkpoint failed");
                }
            }
            Err(err) => {
                warn!(group_id = %group.id, error = %err, "initial checkpoint failed");
            }
        }

        let handle = GroupActor::spawn(state, self.config.clone(), self.checkpoint.clone());
        self.groups.write().await.insert(group.id, handle);
        info!(group_id = %group.id, owner_user_id = %owner.user_id, "group created");
        Ok(group)
    }

    /// Looks up a group's handle, reviving the actor from its checkpoint if
    /// this process has not touched the group yet. `None` means the group
    /// does not exist.
    pub async fn get(&self, group_id: Uuid) -> Option<GroupHandle> {
        if let Some(handle) = self.groups.read().await.get(&group_id) {
            return Some(handle.clone());
        }

        let json = match self.checkpoint.load(&group_id.to_string()).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "checkpoint read failed");
                return None;
            }
        };
        let state: GroupState = match serde_json::from_str(&json) {
            Ok(state) => state,
            Err(err) => {
                warn!(group_id = %group_id, error = %err, "checkpoint is unreadable");
                return None;
            }
        };

        let mut groups = self.groups.write().await;
        // Another request may have revived it while we parsed.
        if let Some(handle) = groups.get(&group_id) {
            return Some(handle.clone());
        }
        info!(group_id = %group_id, "group revived from checkpoint");
        let handle = GroupActor::spawn(state, self.config.clone(), self.checkpoint.clone());
        groups.insert(group_id, handle.clone());
        Some(handle)
    }
}
