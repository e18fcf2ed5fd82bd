//! HTTP handlers for role administration and photo moderation.
//! Authorization is applied by the router; handlers only translate between
//! HTTP and the services.

use crate::{
    errors::AppError,
    models::{photo::PhotoForApproval, user::UserWithRoles},
    routes::routes::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

/// Query string for `POST /admin/edit-roles/{username}`.
#[derive(Debug, Deserialize)]
pub struct EditRolesQuery {
    pub roles: Option<String>,
}

/// GET `/admin/users-with-roles`
pub async fn users_with_roles(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserWithRoles>>, AppError> {
    Ok(Json(state.roles.users_with_roles().await?))
}

/// POST `/admin/edit-roles/{username}?roles=Admin,Moderator`
pub async fn edit_roles(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(q): Query<EditRolesQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let roles = state.roles.edit_roles(&username, q.roles.as_deref()).await?;
    Ok(Json(roles))
}

/// GET `/admin/photos-to-moderate`
pub async fn photos_to_moderate(
    State(state): State<AppState>,
) -> Result<Json<Vec<PhotoForApproval>>, AppError> {
    Ok(Json(state.moderation.list_pending_photos().await?))
}

/// POST `/admin/approve-photo/{photo_id}`
pub async fn approve_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.moderation.approve_photo(photo_id).await?;
    Ok(StatusCode::OK)
}

/// POST `/admin/reject-photo/{photo_id}`
pub async fn reject_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.moderation.reject_photo(photo_id).await?;
    Ok(StatusCode::OK)
}
