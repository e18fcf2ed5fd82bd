//! Defines routes for the admin API.
//!
//! ## Structure
//! - **Role administration** (`Admin` role)
//!   - `GET  /admin/users-with-roles`
//!   - `POST /admin/edit-roles/{username}?roles=csv`
//!
//! - **Photo moderation** (`Admin` or `Moderator` role)
//!   - `GET  /admin/photos-to-moderate`
//!   - `POST /admin/approve-photo/{photo_id}`
//!   - `POST /admin/reject-photo/{photo_id}`
//!
//! - **Probes** (no auth): `GET /healthz`, `GET /readyz`

use crate::{
    auth::{AuthKeys, require_admin, require_moderator},
    handlers::{
        admin_handlers::{
            approve_photo, edit_roles, photos_to_moderate, reject_photo, users_with_roles,
        },
        health_handlers::{healthz, readyz},
    },
    services::{moderation_service::ModerationService, role_service::RoleService},
};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub moderation: ModerationService,
    pub roles: RoleService,
    pub auth: AuthKeys,
}

/// Build the full router with each admin scope behind its own policy layer.
pub fn routes(state: AppState) -> Router {
    let role_admin = Router::new()
        .route("/admin/users-with-roles", get(users_with_roles))
        .route("/admin/edit-roles/{username}", post(edit_roles))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let moderation = Router::new()
        .route("/admin/photos-to-moderate", get(photos_to_moderate))
        .route("/admin/approve-photo/{photo_id}", post(approve_photo))
        .route("/admin/reject-photo/{photo_id}", post(reject_photo))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_moderator,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(role_admin)
        .merge(moderation)
        .with_state(state)
}
