//! src/services/moderation_service.rs
//!
//! ModerationService: the photo lifecycle. Pending photos are either approved
//! (and possibly promoted to their owner's main photo) or rejected, which
//! removes the remote asset first and the record second.

use crate::{
    models::photo::{Photo, PhotoForApproval},
    services::{asset_deleter::AssetDeleter, photo_store::PhotoStore, user_store::UserStore},
};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Could not find photo {0}")]
    NotFound(i64),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    AssetDeletionFailed(String),
    #[error("Problem {action} photo")]
    PersistenceFailure {
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ModerationResult<T> = Result<T, ModerationError>;

/// The write that came back with no rows changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Approve,
    Reject,
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ModerationService {
    photos: PhotoStore,
    users: UserStore,
    assets: Arc<dyn AssetDeleter>,
}

impl ModerationService {
    pub fn new(photos: PhotoStore, users: UserStore, assets: Arc<dyn AssetDeleter>) -> Self {
        Self {
            photos,
            users,
            assets,
        }
    }

    /// Every unapproved photo, including ones the default view hides.
    ///
    /// Photos whose owner no longer exists are listed without a username.
    pub async fn list_pending_photos(&self) -> ModerationResult<Vec<PhotoForApproval>> {
        let photos = self.photos.admin().find_unapproved().await?;

        let mut usernames: HashMap<i64, Option<String>> = HashMap::new();
        let mut pending = Vec::with_capacity(photos.len());
        for photo in &photos {
            let username = match usernames.get(&photo.owner_user_id) {
                Some(cached) => cached.clone(),
                None => {
                    let name = self
                        .users
                        .find_by_id(photo.owner_user_id)
                        .await?
                        .map(|user| user.username);
                    usernames.insert(photo.owner_user_id, name.clone());
                    name
                }
            };
            pending.push(PhotoForApproval::new(photo, username));
        }

        Ok(pending)
    }

    /// Approve a photo and make it the owner's main photo if they have none.
    ///
    /// Re-approving is allowed and leaves `is_main` alone when another main
    /// photo exists. A missing owner skips promotion without failing.
    pub async fn approve_photo(&self, photo_id: i64) -> ModerationResult<Photo> {
        let photo = self
            .photos
            .admin()
            .find_by_id(photo_id)
            .await?
            .ok_or(ModerationError::NotFound(photo_id))?;

        let owner = self.users.find_by_id(photo.owner_user_id).await?;

        let persist = |source: sqlx::Error| ModerationError::PersistenceFailure {
            action: "approving",
            source,
        };

        let mut tx = self.photos.begin().await.map_err(persist)?;
        if PhotoStore::approve(&mut tx, photo_id).await.map_err(persist)? == 0 {
            tx.rollback().await.map_err(persist)?;
            return Err(self.explain_missed_write(photo_id, Attempt::Approve).await);
        }

        match &owner {
            Some(user) => {
                let promoted = PhotoStore::promote_if_no_main(&mut tx, photo_id, user.id)
                    .await
                    .map_err(persist)?;
                if promoted {
                    info!(photo_id, user = %user.username, "promoted photo to main");
                }
            }
            None => warn!(
                photo_id,
                owner_user_id = photo.owner_user_id,
                "owner not found, approving without main-photo promotion"
            ),
        }

        tx.commit().await.map_err(persist)?;
        info!(photo_id, "approved photo");

        self.photos
            .visible()
            .find_by_id(photo_id)
            .await?
            .ok_or(ModerationError::NotFound(photo_id))
    }

    /// Reject a pending photo: delete its remote asset, then its record.
    ///
    /// The photo is claimed before the remote call so a concurrent approval
    /// or a second rejection is refused instead of racing the delete. If the
    /// asset delete fails the claim is released and the record stays.
    pub async fn reject_photo(&self, photo_id: i64) -> ModerationResult<()> {
        let photo = self
            .photos
            .admin()
            .find_by_id(photo_id)
            .await?
            .ok_or(ModerationError::NotFound(photo_id))?;

        if photo.is_approved {
            return Err(ModerationError::InvalidState(
                "Cannot reject approved photo".into(),
            ));
        }

        let claimed_at = Utc::now();
        if self
            .photos
            .admin()
            .claim_for_deletion(photo_id, claimed_at)
            .await?
            == 0
        {
            return Err(self.explain_missed_write(photo_id, Attempt::Reject).await);
        }

        self.finish_rejection(&photo, Some(claimed_at)).await
    }

    /// Complete rejections whose claim is older than `stale_after`.
    ///
    /// Each claim is taken over before it is finished, so two sweeps never
    /// work the same photo. Claims survive a failure here and the next sweep
    /// retries them once they go stale again.
    pub async fn reconcile_stale_rejections(
        &self,
        stale_after: Duration,
    ) -> ModerationResult<ReconcileStats> {
        let now = Utc::now();
        let stale = self.photos.admin().find_stale_claims(now - stale_after).await?;

        let mut stats = ReconcileStats::default();
        for photo in &stale {
            let Some(previous) = photo.pending_deletion_at else {
                continue;
            };
            if self.photos.admin().take_over_claim(photo.id, previous, now).await? == 0 {
                debug!(photo_id = photo.id, "claim moved on, skipping");
                continue;
            }
            match self.finish_rejection(photo, None).await {
                Ok(()) => stats.completed += 1,
                Err(err) => {
                    warn!(photo_id = photo.id, "could not finish rejection: {}", err);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Delete the asset and then the record of a claimed photo. On asset
    /// failure the claim stamped `release` is dropped; `None` keeps it.
    async fn finish_rejection(
        &self,
        photo: &Photo,
        release: Option<DateTime<Utc>>,
    ) -> ModerationResult<()> {
        if let Some(public_id) = photo.public_id.as_deref() {
            if let Err(err) = self.assets.delete(public_id).await {
                warn!(photo_id = photo.id, public_id, "asset deletion failed: {}", err);
                if let Some(claimed_at) = release {
                    match self.photos.admin().release_claim(photo.id, claimed_at).await {
                        Ok(0) => debug!(photo_id = photo.id, "claim already taken over"),
                        Ok(_) => {}
                        Err(release_err) => {
                            warn!(photo_id = photo.id, "could not release claim: {}", release_err)
                        }
                    }
                }
                return Err(ModerationError::AssetDeletionFailed(err.message));
            }
        }

        let persist = |source: sqlx::Error| ModerationError::PersistenceFailure {
            action: "rejecting",
            source,
        };

        let mut tx = self.photos.begin().await.map_err(persist)?;
        if PhotoStore::remove(&mut tx, photo.id).await.map_err(persist)? == 0 {
            tx.rollback().await.map_err(persist)?;
            return Err(self.explain_missed_write(photo.id, Attempt::Reject).await);
        }
        tx.commit().await.map_err(persist)?;

        info!(photo_id = photo.id, "rejected photo");
        Ok(())
    }

    /// Work out why a guarded write touched no rows.
    async fn explain_missed_write(&self, photo_id: i64, attempt: Attempt) -> ModerationError {
        match self.photos.admin().find_by_id(photo_id).await {
            Ok(None) => ModerationError::NotFound(photo_id),
            Ok(Some(photo)) if photo.is_approved => match attempt {
                Attempt::Reject => {
                    ModerationError::InvalidState("Cannot reject approved photo".into())
                }
                Attempt::Approve => {
                    ModerationError::InvalidState(format!("Photo {} is already approved", photo_id))
                }
            },
            Ok(Some(photo)) if photo.is_claimed_for_deletion() => {
                ModerationError::InvalidState(format!("Photo {} is being rejected", photo_id))
            }
            Ok(Some(_)) => ModerationError::InvalidState(format!(
                "Photo {} changed while it was being moderated",
                photo_id
            )),
            Err(err) => ModerationError::Sqlx(err),
        }
    }
}
