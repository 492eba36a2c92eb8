//! Roster routes: single mutations plus the atomic commit.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::participant::{NewParticipant, Participant, ParticipantPatch, RosterCommit};
use engine::GroupHandle;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::RoleContext;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Auth, OptionalAuth};
use crate::identity::Identity;
use crate::routes::group_handle;

/// Resolves the caller's role against the group's current state and
/// enforces the manager gate shared by every roster mutation.
async fn require_manager(
    handle: &GroupHandle,
    identity: &Identity,
) -> Result<(), ApiError> {
    let group = handle.group().await?;
    let participants = handle.participants().await?;
    RoleContext::resolve(identity, &group, &participants).require_manager()
}

/// Refreshes the metadata index from the group's post-mutation state.
async fn sync_metadata(state: &AppState, handle: &GroupHandle) -> Result<(), ApiError> {
    let group = handle.group().await?;
    let participants = handle.participants().await?;
    state.metadata.sync_group(&group, &participants).await;
    Ok(())
}

/// Public roster read.
///
/// GET /groups/{id}/participants
pub async fn list_participants(
    State(state): State<AppState>,
    _auth: OptionalAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    Ok(Json(handle.participants().await?))
}

/// POST /groups/{id}/participants
pub async fn add_participant(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<NewParticipant>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    request.validate()?;

    let handle = group_handle(&state, group_id).await?;
    require_manager(&handle, &identity).await?;

    let participant = handle.add_participant(request).await?;
    sync_metadata(&state, &handle).await?;

    info!(
        group_id = %group_id,
        participant_id = %participant.id,
        user_id = %identity.user_id,
        "Participant added"
    );

    Ok((StatusCode::CREATED, Json(participant)))
}

/// PATCH /groups/{id}/participants/{pid}
pub async fn update_participant(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path((group_id, participant_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<ParticipantPatch>,
) -> Result<Json<Participant>, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    require_manager(&handle, &identity).await?;

    let participant = handle.update_participant(participant_id, patch).await?;
    sync_metadata(&state, &handle).await?;

    info!(
        group_id = %group_id,
        participant_id = %participant_id,
        user_id = %identity.user_id,
        "Participant updated"
    );

    Ok(Json(participant))
}

/// DELETE /groups/{id}/participants/{pid}
pub async fn remove_participant(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path((group_id, participant_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    require_manager(&handle, &identity).await?;

    handle.remove_participant(participant_id).await?;
    sync_metadata(&state, &handle).await?;

    info!(
        group_id = %group_id,
        participant_id = %participant_id,
        user_id = %identity.user_id,
        "Participant removed"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Atomic roster commit: all removes, updates, and adds apply together or
/// not at all.
///
/// POST /groups/{id}/participants/commit
pub async fn commit_participants(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<RosterCommit>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    request.validate()?;

    let handle = group_handle(&state, group_id).await?;
    require_manager(&handle, &identity).await?;

    let adds = request.adds.len();
    let updates = request.updates.len();
    let removes = request.removes.len();
    let roster = handle.commit_roster(request).await?;
    sync_metadata(&state, &handle).await?;

    info!(
        group_id = %group_id,
        user_id = %identity.user_id,
        adds = adds,
        updates = updates,
        removes = removes,
        "Roster committed"
    );

    Ok(Json(roster))
}
