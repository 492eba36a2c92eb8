//! HTTP route handlers.

pub mod groups;
pub mod health;
pub mod participants;
pub mod realtime;
pub mod spins;

use engine::GroupHandle;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// Looks up the addressed group's actor or fails with the uniform 404.
pub(crate) async fn group_handle(
    state: &AppState,
    group_id: Uuid,
) -> Result<GroupHandle, ApiError> {
    state
        .registry
        .get(group_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Group not found".to_string()))
}
