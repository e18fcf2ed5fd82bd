//! User lookups needed by moderation.

use crate::models::user::AppUser;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct UserStore {
    db: Arc<SqlitePool>,
}

impl UserStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, user_id: i64) -> sqlx::Result<Option<AppUser>> {
        sqlx::query_as::<_, AppUser>("SELECT id, username, created_at FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await
    }
}
