//! File entity model.
//!
//! Files and folders share one table. A folder never references a blob:
//! its `storage_key` and `content_hash` are empty and its `size` is zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// MIME type used for folders.
pub const FOLDER_MIME_TYPE: &str = "inode/directory";

/// A file or folder in a user's tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique identifier.
    pub id: Uuid,
    /// Containing folder; `None` for the owner's root.
    pub parent_id: Option<Uuid>,
    /// Owning user.
    pub owner_id: Uuid,
    /// Display name including extension.
    pub name: String,
    /// Whether this row is a folder.
    pub is_folder: bool,
    /// Byte length of the current blob (0 for folders).
    pub size: i64,
    /// MIME type derived from the extension.
    pub mime_type: String,
    /// Blob locator of the current content.
    #[serde(skip_serializing)]
    pub storage_key: String,
    /// Hex SHA-256 of the current content.
    pub content_hash: String,
    /// Starred by the owner.
    pub is_starred: bool,
    /// Soft-deleted.
    pub is_trashed: bool,
    /// When the row was moved to the trash.
    pub trashed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last metadata or content change.
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// Lowercase extension of the name, if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(stem, ext)| (stem, ext.to_lowercase()))
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .map(|(_, ext)| ext)
    }

    /// Whether this row references a blob.
    pub fn has_content(&self) -> bool {
        !self.is_folder && !self.storage_key.is_empty()
    }
}

/// Data required to insert a new file or folder row.
#[derive(Debug, Clone)]
pub struct NewFile {
    /// Identifier chosen by the caller.
    pub id: Uuid,
    /// Containing folder.
    pub parent_id: Option<Uuid>,
    /// Owning user.
    pub owner_id: Uuid,
    /// Display name.
    pub name: String,
    /// Folder flag.
    pub is_folder: bool,
    /// Content length.
    pub size: i64,
    /// MIME type.
    pub mime_type: String,
    /// Blob locator.
    pub storage_key: String,
    /// Content hash.
    pub content_hash: String,
}

impl NewFile {
    /// A folder row.
    pub fn folder(owner_id: Uuid, parent_id: Option<Uuid>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            parent_id,
            owner_id,
            name: name.into(),
            is_folder: true,
            size: 0,
            mime_type: FOLDER_MIME_TYPE.to_string(),
            storage_key: String::new(),
            content_hash: String::new(),
        }
    }
}

/// Replacement content for an existing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUpdate {
    /// New byte length.
    pub size: i64,
    /// New blob locator.
    pub storage_key: String,
    /// New content hash.
    pub content_hash: String,
}

/// Metadata changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    /// New name.
    pub name: Option<String>,
    /// New parent; `Some(None)` moves to the root.
    pub parent_id: Option<Option<Uuid>>,
    /// New starred flag.
    pub is_starred: Option<bool>,
}

impl FilePatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none() && self.is_starred.is_none()
    }
}
