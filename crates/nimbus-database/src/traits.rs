//! Repository capability traits.
//!
//! Every method that guards a limit (`try_reserve_quota`,
//! `try_increment_download`) is a single atomic step against durable
//! state: callers never read a counter and write it back.

use async_trait::async_trait;
use uuid::Uuid;

use nimbus_core::result::AppResult;
use nimbus_entity::file::{ContentUpdate, File, FilePatch, FileVersion, NewFile, NewFileVersion};
use nimbus_entity::share::{NewShare, Share, SharePermission};
use nimbus_entity::storage::MimeUsage;
use nimbus_entity::user::User;

/// Quota accounting per user.
#[async_trait]
pub trait UserRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Find a user by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Insert the user if missing and return the stored row.
    async fn ensure(&self, id: Uuid, username: &str, default_quota: i64) -> AppResult<User>;

    /// Set the quota limit (0 = unlimited).
    async fn set_quota_limit(&self, id: Uuid, limit: i64) -> AppResult<User>;

    /// Atomically add `bytes` to `storage_used` unless that would pass the
    /// limit. Returns `false` when the quota would be exceeded.
    async fn try_reserve_quota(&self, id: Uuid, bytes: i64) -> AppResult<bool>;

    /// Give back previously reserved bytes, never going below zero.
    async fn release_quota(&self, id: Uuid, bytes: i64) -> AppResult<()>;

    /// Recompute `storage_used` from the user's file rows.
    async fn recalculate_usage(&self, id: Uuid) -> AppResult<i64>;
}

/// File and folder rows.
#[async_trait]
pub trait FileRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Find a row by ID regardless of owner or trash state.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>>;

    /// Non-trashed children of `parent` (root when `None`), ordered by name then id.
    async fn list_children(&self, owner_id: Uuid, parent_id: Option<Uuid>) -> AppResult<Vec<File>>;

    /// Trashed rows of the owner, most recently trashed first.
    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<File>>;

    /// Starred, non-trashed rows, ordered by name then id.
    async fn list_starred(&self, owner_id: Uuid) -> AppResult<Vec<File>>;

    /// Case-insensitive substring match on name over non-trashed rows.
    async fn search(&self, owner_id: Uuid, query: &str, limit: i64) -> AppResult<Vec<File>>;

    /// The row and all of its descendants.
    async fn list_subtree(&self, id: Uuid) -> AppResult<Vec<File>>;

    /// Insert a new row.
    async fn create(&self, data: &NewFile) -> AppResult<File>;

    /// Apply a metadata patch.
    async fn update_metadata(&self, id: Uuid, patch: &FilePatch) -> AppResult<File>;

    /// Point the row at new content.
    async fn replace_content(&self, id: Uuid, content: &ContentUpdate) -> AppResult<File>;

    /// Set or clear the trash flags.
    async fn set_trashed(&self, id: Uuid, trashed: bool) -> AppResult<File>;

    /// Delete the row; descendants, versions and shares cascade.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Non-folder row count and per-MIME usage of the owner.
    async fn usage_by_mime_type(&self, owner_id: Uuid) -> AppResult<(i64, Vec<MimeUsage>)>;
}

/// Version snapshots.
#[async_trait]
pub trait VersionRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a snapshot numbered one past the file's highest version.
    async fn create_snapshot(&self, data: &NewFileVersion) -> AppResult<FileVersion>;

    /// All versions of a file, newest first.
    async fn list(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>>;

    /// A specific version.
    async fn find(&self, file_id: Uuid, version: i32) -> AppResult<Option<FileVersion>>;
}

/// User grants and public links.
#[async_trait]
pub trait ShareRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a share.
    async fn create(&self, data: &NewShare) -> AppResult<Share>;

    /// Insert a user share, or update the permission of the existing one
    /// for the same file and grantee. Returns the share and whether it was
    /// newly created.
    async fn upsert_user_share(
        &self,
        file_id: Uuid,
        owner_id: Uuid,
        shared_with: Uuid,
        permission: SharePermission,
    ) -> AppResult<(Share, bool)>;

    /// Find a share by ID.
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Share>>;

    /// Find a public link by token.
    async fn find_by_token(&self, token: &str) -> AppResult<Option<Share>>;

    /// Shares created by the owner, optionally for one file, newest first.
    async fn list_by_owner(&self, owner_id: Uuid, file_id: Option<Uuid>) -> AppResult<Vec<Share>>;

    /// User shares granted to `user_id`, newest first.
    async fn list_shared_with(&self, user_id: Uuid) -> AppResult<Vec<Share>>;

    /// Accept one download if the limit allows it. Returns the updated
    /// share, or `None` when the limit is already reached.
    async fn try_increment_download(&self, id: Uuid) -> AppResult<Option<Share>>;

    /// Bump `view_count` and `last_accessed_at`.
    async fn record_view(&self, id: Uuid) -> AppResult<()>;

    /// Delete a share.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}
