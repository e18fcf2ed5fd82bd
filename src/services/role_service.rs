//! Role administration on top of the identity store.

use crate::{
    models::user::UserWithRoles,
    services::identity_store::{IdentityError, IdentityStore},
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("You must select at least one role")]
    Validation,
    #[error("User not found")]
    UserNotFound(String),
    #[error("Failed to add to roles: {0}")]
    AddRolesFailed(#[source] IdentityError),
    #[error("Failed to remove from roles: {0}")]
    RemoveRolesFailed(#[source] IdentityError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RoleResult<T> = Result<T, RoleError>;

#[derive(Clone)]
pub struct RoleService {
    identity: IdentityStore,
}

impl RoleService {
    pub fn new(identity: IdentityStore) -> Self {
        Self { identity }
    }

    pub async fn users_with_roles(&self) -> RoleResult<Vec<UserWithRoles>> {
        Ok(self.identity.users_with_roles().await?)
    }

    /// Replace `username`'s roles with the comma-separated `roles`.
    ///
    /// Additions are applied before removals. If removal fails the additions
    /// stay in place and the error says so.
    pub async fn edit_roles(&self, username: &str, roles: Option<&str>) -> RoleResult<Vec<String>> {
        let selected = parse_roles(roles.unwrap_or_default())?;

        let user = self
            .identity
            .find_by_username(username)
            .await?
            .ok_or_else(|| RoleError::UserNotFound(username.to_string()))?;

        let current: BTreeSet<String> = self.identity.roles_of(&user).await?.into_iter().collect();
        let to_add: BTreeSet<String> = selected.difference(&current).cloned().collect();
        let to_remove: BTreeSet<String> = current.difference(&selected).cloned().collect();

        if !to_add.is_empty() {
            self.identity
                .add_roles(&user, &to_add)
                .await
                .map_err(RoleError::AddRolesFailed)?;
        }
        if !to_remove.is_empty() {
            self.identity
                .remove_roles(&user, &to_remove)
                .await
                .map_err(RoleError::RemoveRolesFailed)?;
        }

        info!(username, added = ?to_add, removed = ?to_remove, "edited roles");
        Ok(self.identity.roles_of(&user).await?)
    }
}

/// Split a comma-separated role list, ignoring blanks and duplicates.
fn parse_roles(raw: &str) -> RoleResult<BTreeSet<String>> {
    let roles: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    if roles.is_empty() {
        return Err(RoleError::Validation);
    }
    Ok(roles)
}
