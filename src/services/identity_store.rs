//! src/services/identity_store.rs
//!
//! IdentityStore: users and role memberships. Role names must already exist
//! in the `roles` table; memberships are rows in `user_roles`.

use crate::models::user::{AppUser, UserWithRoles};
use sqlx::SqlitePool;
use std::{collections::BTreeSet, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("role `{0}` does not exist")]
    UnknownRole(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct IdentityStore {
    db: Arc<SqlitePool>,
}

impl IdentityStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn find_by_username(&self, username: &str) -> sqlx::Result<Option<AppUser>> {
        sqlx::query_as::<_, AppUser>(
            "SELECT id, username, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&*self.db)
        .await
    }

    /// Role names held by `user`, sorted.
    pub async fn roles_of(&self, user: &AppUser) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM user_roles ur
             JOIN roles r ON r.id = ur.role_id
             WHERE ur.user_id = ?
             ORDER BY r.name",
        )
        .bind(user.id)
        .fetch_all(&*self.db)
        .await
    }

    /// Add every role in `roles` to `user`. All or nothing: an unknown role
    /// aborts the whole batch.
    pub async fn add_roles(
        &self,
        user: &AppUser,
        roles: &BTreeSet<String>,
    ) -> Result<(), IdentityError> {
        let mut tx = self.db.begin().await?;
        for role in roles {
            let role_id: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
                .bind(role)
                .fetch_optional(&mut *tx)
                .await?;
            let role_id = role_id.ok_or_else(|| IdentityError::UnknownRole(role.clone()))?;

            sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
                .bind(user.id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_roles(
        &self,
        user: &AppUser,
        roles: &BTreeSet<String>,
    ) -> Result<(), IdentityError> {
        let mut tx = self.db.begin().await?;
        for role in roles {
            sqlx::query(
                "DELETE FROM user_roles
                 WHERE user_id = ? AND role_id = (SELECT id FROM roles WHERE name = ?)",
            )
            .bind(user.id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Every user ordered by username, each with their sorted role names.
    pub async fn users_with_roles(&self) -> sqlx::Result<Vec<UserWithRoles>> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT u.id, u.username, r.name
             FROM users u
             LEFT JOIN user_roles ur ON ur.user_id = u.id
             LEFT JOIN roles r ON r.id = ur.role_id
             ORDER BY u.username, r.name",
        )
        .fetch_all(&*self.db)
        .await?;

        let mut users: Vec<UserWithRoles> = Vec::new();
        for (id, username, role) in rows {
            match users.last_mut() {
                Some(last) if last.id == id => last.roles.extend(role),
                _ => users.push(UserWithRoles {
                    id,
                    username,
                    roles: role.into_iter().collect(),
                }),
            }
        }
        Ok(users)
    }
}
