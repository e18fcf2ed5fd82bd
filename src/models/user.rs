//! Represents application users and their role memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An account known to the identity store.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct AppUser {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Row returned by `GET /admin/users-with-roles`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserWithRoles {
    pub id: i64,
    pub username: String,
    pub roles: Vec<String>,
}
