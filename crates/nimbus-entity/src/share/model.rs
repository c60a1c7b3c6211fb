//! Share entity model.
//!
//! A share is either a grant to another user or a public link. Both are
//! stored in one table with a check constraint; in Rust the distinction is
//! the [`ShareKind`] variant so a share can never be both or neither.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use nimbus_core::error::AppError;

/// Permission granted by a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_permission", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SharePermission {
    View,
    Edit,
    Admin,
    Download,
}

impl SharePermission {
    /// Whether the holder may fetch the file's bytes.
    pub fn allows_download(self) -> bool {
        !matches!(self, Self::View)
    }
}

/// Variant-specific share data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "share_type", rename_all = "snake_case")]
pub enum ShareKind {
    /// A grant to a single registered user.
    User {
        /// The grantee.
        shared_with: Uuid,
    },
    /// An unauthenticated link addressed by a secret token.
    Public {
        /// The link token.
        token: String,
        /// bcrypt hash of the link password.
        #[serde(skip_serializing, default)]
        password_hash: Option<String>,
        /// When the link stops working.
        expires_at: Option<DateTime<Utc>>,
        /// Maximum accepted downloads.
        max_downloads: Option<i32>,
    },
}

/// A share with its common header and its variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub id: Uuid,
    /// Shared file.
    pub file_id: Uuid,
    /// User who created the share.
    pub owner_id: Uuid,
    pub permission: SharePermission,
    /// Best-effort view counter.
    pub view_count: i32,
    /// Accepted downloads; never exceeds `max_downloads`.
    pub download_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// User grant or public link.
    #[serde(flatten)]
    pub kind: ShareKind,
}

impl Share {
    /// The public token, if this is a link.
    pub fn token(&self) -> Option<&str> {
        match &self.kind {
            ShareKind::Public { token, .. } => Some(token),
            ShareKind::User { .. } => None,
        }
    }

    /// Whether a public link has passed its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(&self.kind, ShareKind::Public { expires_at: Some(at), .. } if *at <= now)
    }

    /// Remaining downloads, `None` when unlimited or not a link.
    pub fn downloads_left(&self) -> Option<i32> {
        match &self.kind {
            ShareKind::Public {
                max_downloads: Some(max),
                ..
            } => Some((max - self.download_count).max(0)),
            _ => None,
        }
    }

    /// Whether a download limit is set and used up.
    pub fn is_exhausted(&self) -> bool {
        self.downloads_left() == Some(0)
    }

    /// Whether the link requires a password.
    pub fn has_password(&self) -> bool {
        matches!(
            &self.kind,
            ShareKind::Public {
                password_hash: Some(_),
                ..
            }
        )
    }
}

/// Flat database row of the `shares` table.
#[derive(Debug, Clone, FromRow)]
pub struct ShareRow {
    pub id: Uuid,
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub shared_with: Option<Uuid>,
    pub token: Option<String>,
    pub permission: SharePermission,
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_downloads: Option<i32>,
    pub download_count: i32,
    pub view_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ShareRow> for Share {
    type Error = AppError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        let kind = match (row.shared_with, row.token) {
            (Some(shared_with), None) => ShareKind::User { shared_with },
            (None, Some(token)) => ShareKind::Public {
                token,
                password_hash: row.password_hash,
                expires_at: row.expires_at,
                max_downloads: row.max_downloads,
            },
            _ => {
                return Err(AppError::internal(format!(
                    "Share {} must have exactly one of shared_with and token",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            file_id: row.file_id,
            owner_id: row.owner_id,
            permission: row.permission,
            view_count: row.view_count,
            download_count: row.download_count,
            last_accessed_at: row.last_accessed_at,
            created_at: row.created_at,
            kind,
        })
    }
}

/// Data required to create a share.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub permission: SharePermission,
    pub kind: ShareKind,
}

impl NewShare {
    /// Materialize the share with fresh identity and zeroed counters.
    pub fn into_share(self) -> Share {
        Share {
            id: Uuid::now_v7(),
            file_id: self.file_id,
            owner_id: self.owner_id,
            permission: self.permission,
            view_count: 0,
            download_count: 0,
            last_accessed_at: None,
            created_at: Utc::now(),
            kind: self.kind,
        }
    }
}
