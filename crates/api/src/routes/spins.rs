//! Spin routes: request, history, save, discard.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::spin::{GroupSpinState, SpinHistoryItem};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::access::RoleContext;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::Auth;
use crate::identity::Identity;
use crate::routes::group_handle;

#[derive(Debug, Serialize)]
pub struct SpinResponse {
    pub spin: GroupSpinState,
}

async fn require_participant(
    handle: &engine::GroupHandle,
    identity: &Identity,
) -> Result<(), ApiError> {
    let group = handle.group().await?;
    let participants = handle.participants().await?;
    RoleContext::resolve(identity, &group, &participants).require_participant()
}

/// Start a spin. The response carries the already-decided spin state; the
/// resolution itself arrives over the WebSocket.
///
/// POST /groups/{id}/spin
pub async fn request_spin(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path(group_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SpinResponse>), ApiError> {
    let handle = group_handle(&state, group_id).await?;
    require_participant(&handle, &identity).await?;

    let spin = handle.request_spin().await?;

    info!(
        group_id = %group_id,
        user_id = %identity.user_id,
        spin_id = ?spin.spin_id,
        "Spin started"
    );

    Ok((StatusCode::ACCEPTED, Json(SpinResponse { spin })))
}

/// GET /groups/{id}/history
pub async fn list_history(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Vec<SpinHistoryItem>>, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    require_participant(&handle, &identity).await?;
    Ok(Json(handle.history().await?))
}

/// Confirm a pending spin result. Saving twice is a no-op.
///
/// POST /groups/{id}/history/{spinId}/save
pub async fn save_spin(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path((group_id, spin_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    require_participant(&handle, &identity).await?;

    handle.save_spin(spin_id).await?;

    info!(
        group_id = %group_id,
        spin_id = %spin_id,
        user_id = %identity.user_id,
        "Spin result saved"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Discard a pending spin result: counters roll back and the history entry
/// disappears. After the pending TTL only the history entry is removed.
///
/// DELETE /groups/{id}/history/{spinId}
pub async fn discard_spin(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path((group_id, spin_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    require_participant(&handle, &identity).await?;

    handle.discard_spin(spin_id).await?;

    info!(
        group_id = %group_id,
        spin_id = %spin_id,
        user_id = %identity.user_id,
        "Spin result discarded"
    );

    Ok(StatusCode::NO_CONTENT)
}
