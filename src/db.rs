//! SQLite pool construction and schema migration.

use anyhow::Result;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, time::Duration};

const INIT_SQL: &str = include_str!("../migrations/0001_init.sql");

/// Open the SQLite pool, creating the database file and its parent directory
/// when they do not exist yet.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    if !db_path.starts_with(":memory:") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Apply the embedded schema. Every statement is idempotent, so running this
/// against an already-initialized database is harmless.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent_and_seed_roles() {
        let pool = test_support::memory_pool().await;
        run_migrations(&pool).await.unwrap();

        let roles: Vec<String> = sqlx::query_scalar("SELECT name FROM roles ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(roles, vec!["Admin", "Member", "Moderator"]);
    }

    #[tokio::test]
    async fn second_main_photo_for_same_owner_is_rejected_by_schema() {
        let pool = test_support::memory_pool().await;
        let user = test_support::insert_user(&pool, "lisa", &[]).await;
        test_support::insert_photo(&pool, user, true, true, None).await;

        let second = sqlx::query(
            "INSERT INTO photos (url, owner_user_id, is_approved, is_main) VALUES ('x', ?, 1, 1)",
        )
        .bind(user)
        .execute(&pool)
        .await;
        assert!(second.is_err());
    }
}
