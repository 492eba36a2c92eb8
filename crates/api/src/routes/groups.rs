//! Group lifecycle, listing, and bookmark routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::group::{Group, GroupRecord};
use engine::OwnerIdentity;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::RoleContext;
use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Auth, OptionalAuth};
use crate::routes::group_handle;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenameGroupRequest {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarksRequest {
    pub group_ids: Vec<Uuid>,
}

/// Create a group.
///
/// POST /groups
///
/// The authenticated caller becomes the owner; its owner participant is
/// seeded from the identity's primary email and display name.
pub async fn create_group(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    request.validate()?;

    let owner = OwnerIdentity {
        user_id: identity.user_id,
        email: identity.primary_email.clone(),
        display_name: identity.display_name.clone(),
    };
    let group = state.registry.create_group(&request.name, owner).await?;

    let handle = group_handle(&state, group.id).await?;
    let participants = handle.participants().await?;
    state.metadata.on_group_created(&group, &participants).await;

    info!(
        group_id = %group.id,
        group_name = %group.name,
        owner_user_id = %identity.user_id,
        "Group created"
    );

    Ok((StatusCode::CREATED, Json(group)))
}

/// List the caller's groups: owned plus email-matched memberships.
///
/// GET /groups/me
pub async fn list_my_groups(
    State(state): State<AppState>,
    Auth(identity): Auth,
) -> Result<Json<Vec<GroupRecord>>, ApiError> {
    let records = state.metadata.groups_for(&identity).await;
    Ok(Json(records))
}

/// GET /groups/bookmarks
pub async fn get_bookmarks(
    State(state): State<AppState>,
    Auth(identity): Auth,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    Ok(Json(state.metadata.bookmarks(identity.user_id).await))
}

/// Replace the caller's bookmark list; responds with the normalized list.
///
/// PUT /groups/bookmarks
pub async fn put_bookmarks(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Json(request): Json<BookmarksRequest>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    let stored = state
        .metadata
        .put_bookmarks(identity.user_id, &request.group_ids)
        .await;
    Ok(Json(stored))
}

/// Public group read.
///
/// GET /groups/{id}
pub async fn get_group(
    State(state): State<AppState>,
    _auth: OptionalAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<Group>, ApiError> {
    let handle = group_handle(&state, group_id).await?;
    Ok(Json(handle.group().await?))
}

/// Rename a group. Managers only.
///
/// PATCH /groups/{id}
pub async fn rename_group(
    State(state): State<AppState>,
    Auth(identity): Auth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<RenameGroupRequest>,
) -> Result<Json<Group>, ApiError> {
    request.validate()?;

    let handle = group_handle(&state, group_id).await?;
    let group = handle.group().await?;
    let participants = handle.participants().await?;
    RoleContext::resolve(&identity, &group, &participants).require_manager()?;

    let updated = handle.rename(request.name).await?;
    state.metadata.sync_group(&updated, &participants).await;

    info!(
        group_id = %group_id,
        user_id = %identity.user_id,
        "Group renamed"
    );

    Ok(Json(updated))
}
