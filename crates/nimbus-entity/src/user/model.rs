//! User entity model.
//!
//! Identity and credentials are owned by the external identity service;
//! this row only tracks storage accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::storage::StorageQuota;

/// A user as seen by the filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier (the `sub` of the identity token).
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Quota in bytes; 0 means unlimited.
    pub quota_limit: i64,
    /// Bytes currently accounted to the user.
    pub storage_used: i64,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Quota view of this user.
    pub fn quota(&self) -> StorageQuota {
        StorageQuota::new(self.quota_limit, self.storage_used)
    }
}
