//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A frozen snapshot of a previous state of a file's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Unique version identifier.
    pub id: Uuid,
    /// The file this version belongs to.
    pub file_id: Uuid,
    /// Per-file sequence number, starting at 1.
    pub version: i32,
    /// Size in bytes.
    pub size: i64,
    /// Blob locator of the snapshot.
    #[serde(skip_serializing)]
    pub storage_key: String,
    /// Hex SHA-256 of the snapshot.
    pub content_hash: String,
    /// User whose write produced the snapshot.
    pub created_by: Uuid,
    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

/// Snapshot data; the repository assigns the version number.
#[derive(Debug, Clone)]
pub struct NewFileVersion {
    pub file_id: Uuid,
    pub size: i64,
    pub storage_key: String,
    pub content_hash: String,
    pub created_by: Uuid,
}
