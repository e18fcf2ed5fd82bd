//! src/services/photo_store.rs
//!
//! PhotoStore: SQLite-backed photo records exposed through two accessors:
//! `visible()` applies the default visibility filter (approved photos only),
//! `admin()` sees every row and is what moderation uses. Writes that must
//! commit together take a transaction connection from `begin()`.

use crate::models::photo::Photo;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::sync::Arc;
use tracing::debug;

const PHOTO_COLUMNS: &str =
    "id, url, owner_user_id, is_approved, is_main, public_id, pending_deletion_at";

#[derive(Clone)]
pub struct PhotoStore {
    db: Arc<SqlitePool>,
}

/// Default view: hides photos that have not been approved.
pub struct VisiblePhotos<'a> {
    db: &'a SqlitePool,
}

/// Unrestricted view used by moderators.
pub struct AdminPhotos<'a> {
    db: &'a SqlitePool,
}

impl PhotoStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// What ordinary users may see. Moderation reads through `admin()`.
    pub fn visible(&self) -> VisiblePhotos<'_> {
        VisiblePhotos { db: &self.db }
    }

    pub fn admin(&self) -> AdminPhotos<'_> {
        AdminPhotos { db: &self.db }
    }

    /// Start a unit of work. Nothing written through the returned
    /// transaction is visible until `commit()`.
    pub async fn begin(&self) -> sqlx::Result<Transaction<'static, Sqlite>> {
        self.db.begin().await
    }

    /// Flag a pending photo as approved. Claimed photos are left untouched.
    ///
    /// Returns the number of rows changed (0 or 1).
    pub async fn approve(conn: &mut SqliteConnection, photo_id: i64) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE photos SET is_approved = 1
             WHERE id = ? AND pending_deletion_at IS NULL",
        )
        .bind(photo_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Make `photo_id` its owner's main photo unless the owner already has one.
    ///
    /// The check and the write are one statement, so two approvals racing for
    /// the same owner cannot both promote.
    pub async fn promote_if_no_main(
        conn: &mut SqliteConnection,
        photo_id: i64,
        owner_user_id: i64,
    ) -> sqlx::Result<bool> {
        let result = sqlx::query(
            "UPDATE photos SET is_main = 1
             WHERE id = ?
               AND NOT EXISTS (
                   SELECT 1 FROM photos
                   WHERE owner_user_id = ? AND is_main = 1 AND id <> ?
               )",
        )
        .bind(photo_id)
        .bind(owner_user_id)
        .bind(photo_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete a photo record, provided it is still pending.
    pub async fn remove(conn: &mut SqliteConnection, photo_id: i64) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ? AND is_approved = 0")
            .bind(photo_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

impl VisiblePhotos<'_> {
    pub async fn find_by_id(&self, photo_id: i64) -> sqlx::Result<Option<Photo>> {
        sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ? AND is_approved = 1"
        ))
        .bind(photo_id)
        .fetch_optional(self.db)
        .await
    }
}

impl AdminPhotos<'_> {
    pub async fn find_by_id(&self, photo_id: i64) -> sqlx::Result<Option<Photo>> {
        sqlx::query_as::<_, Photo>(&format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?"))
            .bind(photo_id)
            .fetch_optional(self.db)
            .await
    }

    pub async fn find_unapproved(&self) -> sqlx::Result<Vec<Photo>> {
        sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE is_approved = 0 ORDER BY id"
        ))
        .fetch_all(self.db)
        .await
    }

    /// Pending photos whose rejection was claimed before `cutoff` and never finished.
    pub async fn find_stale_claims(&self, cutoff: DateTime<Utc>) -> sqlx::Result<Vec<Photo>> {
        sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos
             WHERE is_approved = 0
               AND pending_deletion_at IS NOT NULL
               AND pending_deletion_at < ?
             ORDER BY id"
        ))
        .bind(cutoff)
        .fetch_all(self.db)
        .await
    }

    /// Mark a pending photo as being rejected.
    ///
    /// Only unclaimed, unapproved photos can be claimed; a rejection already
    /// in flight keeps its claim until it finishes or the reconciler takes over.
    pub async fn claim_for_deletion(&self, photo_id: i64, at: DateTime<Utc>) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE photos SET pending_deletion_at = ?
             WHERE id = ? AND is_approved = 0 AND pending_deletion_at IS NULL",
        )
        .bind(at)
        .bind(photo_id)
        .execute(self.db)
        .await?;
        debug!(photo_id, rows = result.rows_affected(), "claimed photo for deletion");
        Ok(result.rows_affected())
    }

    /// Replace the claim stamped `previous` with one stamped `at`.
    ///
    /// Returns 0 when someone else has moved the claim on, in which case the
    /// caller no longer owns the rejection.
    pub async fn take_over_claim(
        &self,
        photo_id: i64,
        previous: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE photos SET pending_deletion_at = ?
             WHERE id = ? AND is_approved = 0 AND pending_deletion_at = ?",
        )
        .bind(at)
        .bind(photo_id)
        .bind(previous)
        .execute(self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Drop the claim stamped `claimed_at`. A claim held by another caller is left alone.
    pub async fn release_claim(
        &self,
        photo_id: i64,
        claimed_at: DateTime<Utc>,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE photos SET pending_deletion_at = NULL
             WHERE id = ? AND pending_deletion_at = ?",
        )
        .bind(photo_id)
        .bind(claimed_at)
        .execute(self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_photo, insert_user, memory_pool};

    #[tokio::test]
    async fn default_view_hides_unapproved_photos_admin_view_does_not() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "todd", &[]).await;
        let approved = insert_photo(&pool, user, true, true, None).await;
        let pending = insert_photo(&pool, user, false, false, Some("p1")).await;
        let store = PhotoStore::new(Arc::new(pool));

        assert!(store.visible().find_by_id(pending).await.unwrap().is_none());
        assert!(store.admin().find_by_id(pending).await.unwrap().is_some());

        assert_eq!(
            store.visible().find_by_id(approved).await.unwrap().map(|p| p.id),
            Some(approved)
        );

        let unapproved: Vec<i64> = store
            .admin()
            .find_unapproved()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(unapproved, vec![pending]);
    }

    #[tokio::test]
    async fn promotion_is_skipped_when_owner_already_has_main() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "karen", &[]).await;
        insert_photo(&pool, user, true, true, None).await;
        let pending = insert_photo(&pool, user, false, false, None).await;
        let store = PhotoStore::new(Arc::new(pool));

        let mut tx = store.begin().await.unwrap();
        assert_eq!(PhotoStore::approve(&mut tx, pending).await.unwrap(), 1);
        assert!(!PhotoStore::promote_if_no_main(&mut tx, pending, user).await.unwrap());
        tx.commit().await.unwrap();

        let photo = store.admin().find_by_id(pending).await.unwrap().unwrap();
        assert!(photo.is_approved);
        assert!(!photo.is_main);
    }

    #[tokio::test]
    async fn claimed_photo_cannot_be_approved_and_approved_photo_cannot_be_removed() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "davis", &[]).await;
        let pending = insert_photo(&pool, user, false, false, None).await;
        let approved = insert_photo(&pool, user, true, false, None).await;
        let store = PhotoStore::new(Arc::new(pool));

        let claimed_at = Utc::now();
        assert_eq!(store.admin().claim_for_deletion(pending, claimed_at).await.unwrap(), 1);
        assert_eq!(store.admin().claim_for_deletion(approved, Utc::now()).await.unwrap(), 0);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(PhotoStore::approve(&mut tx, pending).await.unwrap(), 0);
        assert_eq!(PhotoStore::remove(&mut tx, approved).await.unwrap(), 0);
        tx.rollback().await.unwrap();

        store.admin().release_claim(pending, claimed_at).await.unwrap();
        let photo = store.admin().find_by_id(pending).await.unwrap().unwrap();
        assert!(!photo.is_claimed_for_deletion());
    }

    #[tokio::test]
    async fn stale_claims_are_found_by_cutoff() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "ruthie", &[]).await;
        let old = insert_photo(&pool, user, false, false, Some("old")).await;
        let fresh = insert_photo(&pool, user, false, false, Some("fresh")).await;
        let store = PhotoStore::new(Arc::new(pool));

        let now = Utc::now();
        store
            .admin()
            .claim_for_deletion(old, now - chrono::Duration::minutes(30))
            .await
            .unwrap();
        store.admin().claim_for_deletion(fresh, now).await.unwrap();

        let stale = store
            .admin()
            .find_stale_claims(now - chrono::Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, old);
    }

    #[tokio::test]
    async fn live_claim_blocks_a_second_claim_and_only_its_owner_can_release_it() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "reba", &[]).await;
        let pending = insert_photo(&pool, user, false, false, Some("a1")).await;
        let store = PhotoStore::new(Arc::new(pool));

        let first = Utc::now() - chrono::Duration::seconds(10);
        let second = Utc::now();
        assert_eq!(store.admin().claim_for_deletion(pending, first).await.unwrap(), 1);
        assert_eq!(store.admin().claim_for_deletion(pending, second).await.unwrap(), 0);

        assert_eq!(store.admin().release_claim(pending, second).await.unwrap(), 0);
        let photo = store.admin().find_by_id(pending).await.unwrap().unwrap();
        assert_eq!(photo.pending_deletion_at, Some(first));
    }

    #[tokio::test]
    async fn take_over_requires_the_current_stamp() {
        let pool = memory_pool().await;
        let user = insert_user(&pool, "reba", &[]).await;
        let pending = insert_photo(&pool, user, false, false, Some("a1")).await;
        let store = PhotoStore::new(Arc::new(pool));

        let original = Utc::now() - chrono::Duration::hours(1);
        let takeover = Utc::now();
        store.admin().claim_for_deletion(pending, original).await.unwrap();

        assert_eq!(
            store.admin().take_over_claim(pending, takeover, takeover).await.unwrap(),
            0
        );
        assert_eq!(
            store.admin().take_over_claim(pending, original, takeover).await.unwrap(),
            1
        );
        // the original holder can no longer release what it does not own
        assert_eq!(store.admin().release_claim(pending, original).await.unwrap(), 0);
        let photo = store.admin().find_by_id(pending).await.unwrap().unwrap();
        assert_eq!(photo.pending_deletion_at, Some(takeover));
    }
}
