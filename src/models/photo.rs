//! Represents a user-submitted photo and its moderation view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single uploaded image belonging to a user.
///
/// Photos start out pending (`is_approved = false`, `is_main = false`) and are
/// moved to approved or deleted exclusively by the moderation service.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    /// Row identifier.
    pub id: i64,

    /// Location of the displayable asset.
    pub url: String,

    /// Owning user. Not enforced as a foreign key: a photo outlives its owner
    /// until it is deleted directly.
    pub owner_user_id: i64,

    /// False until a moderator approves the photo.
    pub is_approved: bool,

    /// At most one main photo per owner.
    pub is_main: bool,

    /// Handle into the remote asset store, absent for seed images.
    pub public_id: Option<String>,

    /// Set while a rejection is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_deletion_at: Option<DateTime<Utc>>,
}

impl Photo {
    pub fn is_claimed_for_deletion(&self) -> bool {
        self.pending_deletion_at.is_some()
    }
}

/// Row returned by `GET /admin/photos-to-moderate`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoForApproval {
    pub id: i64,
    pub url: String,
    pub is_approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl PhotoForApproval {
    pub fn new(photo: &Photo, username: Option<String>) -> Self {
        Self {
            id: photo.id,
            url: photo.url.clone(),
            is_approved: photo.is_approved,
            username,
        }
    }
}
