//! Core file operations: listing, folders, metadata updates and the trash.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::events::{EventType, RealtimeEvent};
use nimbus_core::result::AppResult;
use nimbus_core::traits::{BlobStore, EventPublisher};
use nimbus_database::{Database, FileRepository, UserRepository, VersionRepository};
use nimbus_entity::file::{File, FilePatch, NewFile};
use nimbus_entity::storage::StorageStats;

use crate::context::RequestContext;

/// Maximum number of results returned by [`FileEngine::search`].
const SEARCH_LIMIT: i64 = 200;

/// Maximum length of a file or folder name in bytes.
const MAX_NAME_LEN: usize = 255;

/// Enforces the filesystem rules over the repositories and the blob store.
#[derive(Clone)]
pub struct FileEngine {
    pub(crate) users: Arc<dyn UserRepository>,
    pub(crate) files: Arc<dyn FileRepository>,
    pub(crate) versions: Arc<dyn VersionRepository>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    publisher: Arc<dyn EventPublisher>,
    /// Serializes content writes (update, restore) per file.
    write_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for FileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEngine")
            .field("blobs", &self.blobs.provider_type())
            .finish()
    }
}

/// Metadata changes accepted by [`FileEngine::update`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileUpdate {
    /// New name.
    pub name: Option<String>,
    /// New parent; `Some(None)` moves to the root.
    pub parent_id: Option<Option<Uuid>>,
    /// New starred flag.
    pub is_starred: Option<bool>,
}

impl FileEngine {
    /// Creates a new file engine.
    pub fn new(
        db: &Database,
        blobs: Arc<dyn BlobStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            users: db.users.clone(),
            files: db.files.clone(),
            versions: db.versions.clone(),
            blobs,
            publisher,
            write_locks: Arc::new(DashMap::new()),
        }
    }

    /// Name of the blob backend in use.
    pub fn storage_provider(&self) -> &str {
        self.blobs.provider_type()
    }

    /// Non-trashed children of `parent_id` (root when `None`).
    pub async fn list(&self, ctx: &RequestContext, parent_id: Option<Uuid>) -> AppResult<Vec<File>> {
        self.require_folder(ctx, parent_id).await?;
        self.files.list_children(ctx.user_id, parent_id).await
    }

    /// A file or folder owned by the caller.
    pub async fn get(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        self.files
            .find_by_id(file_id)
            .await?
            .filter(|f| f.owner_id == ctx.user_id)
            .ok_or_else(|| AppError::not_found("File not found"))
    }

    /// Create a folder under `parent_id`.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<File> {
        validate_name(name)?;
        self.require_folder(ctx, parent_id).await?;

        let folder = self
            .files
            .create(&NewFile::folder(ctx.user_id, parent_id, name))
            .await?;

        info!(user_id = %ctx.user_id, folder_id = %folder.id, "Folder created");
        self.emit(EventType::FileCreated, &folder, folder.parent_id);
        Ok(folder)
    }

    /// Rename, star or move a file or folder.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        update: FileUpdate,
    ) -> AppResult<File> {
        let file = self.get(ctx, file_id).await?;
        if file.is_trashed {
            return Err(AppError::validation("Restore the item before changing it"));
        }
        if let Some(name) = &update.name {
            validate_name(name)?;
        }

        let moving_to = update.parent_id.filter(|p| *p != file.parent_id);
        if let Some(target) = moving_to {
            self.require_folder(ctx, target).await?;
            if let Some(target_id) = target {
                if file.is_folder && self.is_within(file.id, target_id).await? {
                    return Err(AppError::validation(
                        "Cannot move a folder into itself or one of its descendants",
                    ));
                }
            }
        }

        let patch = FilePatch {
            name: update.name,
            parent_id: moving_to,
            is_starred: update.is_starred,
        };
        if patch.is_empty() {
            return Ok(file);
        }

        let updated = self.files.update_metadata(file_id, &patch).await?;

        if moving_to.is_some() {
            info!(
                user_id = %ctx.user_id,
                file_id = %file_id,
                from_folder = ?file.parent_id,
                to_folder = ?updated.parent_id,
                "File moved"
            );
            let payload = serde_json::json!({
                "file": updated,
                "old_folder_id": file.parent_id,
                "new_folder_id": updated.parent_id,
            });
            self.publisher.publish(
                RealtimeEvent::new(EventType::FileMoved, ctx.user_id, updated.parent_id, payload)
                    .also_in_folder(file.parent_id),
            );
        } else {
            info!(user_id = %ctx.user_id, file_id = %file_id, "File updated");
            self.emit(EventType::FileUpdated, &updated, updated.parent_id);
        }

        Ok(updated)
    }

    /// Move a file or folder to the trash.
    pub async fn delete(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.get(ctx, file_id).await?;
        if file.is_trashed {
            return Err(AppError::validation("Item is already in the trash"));
        }

        let trashed = self.files.set_trashed(file_id, true).await?;
        info!(user_id = %ctx.user_id, file_id = %file_id, "File moved to trash");
        self.emit(EventType::FileDeleted, &trashed, trashed.parent_id);
        Ok(trashed)
    }

    /// Take a file or folder out of the trash.
    ///
    /// An item with any ancestor still in the trash comes back at the root.
    pub async fn restore(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        let file = self.get(ctx, file_id).await?;
        if !file.is_trashed {
            return Err(AppError::validation("Item is not in the trash"));
        }

        let mut restored = self.files.set_trashed(file_id, false).await?;
        if self.trashed_above(restored.parent_id).await? {
            let patch = FilePatch {
                parent_id: Some(None),
                ..FilePatch::default()
            };
            restored = self.files.update_metadata(file_id, &patch).await?;
        }

        info!(user_id = %ctx.user_id, file_id = %file_id, "File restored");
        self.emit(EventType::FileRestored, &restored, restored.parent_id);
        Ok(restored)
    }

    /// Destroy a file or folder with its whole subtree, every blob and
    /// version blob, and release the quota it used.
    pub async fn permanent_delete(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<()> {
        let file = self.get(ctx, file_id).await?;
        let subtree = self.files.list_subtree(file_id).await?;

        let mut keys = HashSet::new();
        let mut freed = 0i64;
        for item in subtree.iter().filter(|f| !f.is_folder) {
            freed += item.size;
            if !item.storage_key.is_empty() {
                keys.insert(item.storage_key.clone());
            }
            for version in self.versions.list(item.id).await? {
                keys.insert(version.storage_key);
            }
        }

        for key in &keys {
            if let Err(e) = self.blobs.delete(key).await {
                warn!(storage_key = %key, error = %e, "Failed to delete blob, leaving it orphaned");
            }
        }

        self.files.delete(file_id).await?;
        self.release_quota(ctx.user_id, freed).await;
        for item in &subtree {
            self.write_locks.remove(&item.id);
        }

        info!(
            user_id = %ctx.user_id,
            file_id = %file_id,
            items = subtree.len(),
            blobs = keys.len(),
            freed_bytes = freed,
            "File permanently deleted"
        );
        let payload = serde_json::json!({ "id": file.id, "name": file.name, "permanent": true });
        self.publisher.publish(RealtimeEvent::new(
            EventType::FileDeleted,
            ctx.user_id,
            file.parent_id,
            payload,
        ));
        Ok(())
    }

    /// Permanently delete everything in the caller's trash. Returns the
    /// number of trashed items removed.
    pub async fn empty_trash(&self, ctx: &RequestContext) -> AppResult<usize> {
        let trashed = self.files.list_trashed(ctx.user_id).await?;
        let trashed_ids: HashSet<Uuid> = trashed.iter().map(|f| f.id).collect();

        let mut removed = 0;
        for item in trashed
            .iter()
            .filter(|f| f.parent_id.is_none_or(|p| !trashed_ids.contains(&p)))
        {
            match self.permanent_delete(ctx, item.id).await {
                Ok(()) => removed += 1,
                // Already gone with an ancestor removed earlier in this pass.
                Err(e) if e.kind == nimbus_core::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        info!(user_id = %ctx.user_id, removed, "Trash emptied");
        Ok(removed)
    }

    /// Trashed items of the caller.
    pub async fn list_trash(&self, ctx: &RequestContext) -> AppResult<Vec<File>> {
        let mut files = self.files.list_trashed(ctx.user_id).await?;
        sort_by_name(&mut files);
        Ok(files)
    }

    /// Starred items of the caller.
    pub async fn list_starred(&self, ctx: &RequestContext) -> AppResult<Vec<File>> {
        let starred = self.files.list_starred(ctx.user_id).await?;
        self.without_trashed_ancestors(starred).await
    }

    /// Case-insensitive substring search on names.
    pub async fn search(&self, ctx: &RequestContext, query: &str) -> AppResult<Vec<File>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::validation("Search query cannot be empty"));
        }
        let hits = self.files.search(ctx.user_id, query, SEARCH_LIMIT).await?;
        self.without_trashed_ancestors(hits).await
    }

    /// Usage and quota of the caller.
    pub async fn storage_stats(&self, ctx: &RequestContext) -> AppResult<StorageStats> {
        let user = self
            .users
            .find_by_id(ctx.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        let (file_count, by_mime_type) = self.files.usage_by_mime_type(ctx.user_id).await?;
        let quota = user.quota();

        Ok(StorageStats {
            used_bytes: quota.used_bytes,
            quota_limit: quota.limit_bytes,
            used_pct: quota.used_pct(),
            file_count,
            by_mime_type,
        })
    }

    /// Check that `parent_id` is the root or a live folder of the caller.
    pub(crate) async fn require_folder(
        &self,
        ctx: &RequestContext,
        parent_id: Option<Uuid>,
    ) -> AppResult<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        let parent = self.get(ctx, parent_id).await?;
        if parent.is_trashed || self.trashed_above(parent.parent_id).await? {
            return Err(AppError::not_found("Folder not found"));
        }
        if !parent.is_folder {
            return Err(AppError::validation("Parent is not a folder"));
        }
        Ok(())
    }

    /// Whether `folder_id` or any folder above it is trashed or gone.
    async fn trashed_above(&self, mut folder_id: Option<Uuid>) -> AppResult<bool> {
        let mut seen = HashSet::new();
        while let Some(id) = folder_id {
            if !seen.insert(id) {
                break;
            }
            match self.files.find_by_id(id).await? {
                Some(folder) if !folder.is_trashed => folder_id = folder.parent_id,
                _ => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Drop items hidden inside a trashed folder.
    async fn without_trashed_ancestors(&self, files: Vec<File>) -> AppResult<Vec<File>> {
        let mut hidden_under: HashMap<Uuid, bool> = HashMap::new();
        let mut visible = Vec::with_capacity(files.len());
        for file in files {
            let Some(parent_id) = file.parent_id else {
                visible.push(file);
                continue;
            };
            let hidden = match hidden_under.get(&parent_id) {
                Some(hidden) => *hidden,
                None => {
                    let hidden = self.trashed_above(Some(parent_id)).await?;
                    hidden_under.insert(parent_id, hidden);
                    hidden
                }
            };
            if !hidden {
                visible.push(file);
            }
        }
        Ok(visible)
    }

    /// Whether `candidate` is `ancestor` or lies beneath it.
    async fn is_within(&self, ancestor: Uuid, candidate: Uuid) -> AppResult<bool> {
        Ok(self
            .files
            .list_subtree(ancestor)
            .await?
            .iter()
            .any(|f| f.id == candidate))
    }

    /// Reserve `bytes` of the user's quota.
    pub(crate) async fn reserve_quota(&self, user_id: Uuid, bytes: i64) -> AppResult<()> {
        if bytes <= 0 || self.users.try_reserve_quota(user_id, bytes).await? {
            return Ok(());
        }
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Err(AppError::quota_exceeded(format!(
            "Storing {bytes} more bytes would exceed the quota of {} bytes ({} used)",
            user.quota_limit, user.storage_used
        )))
    }

    /// Give back reserved quota. Failures are logged, not returned.
    pub(crate) async fn release_quota(&self, user_id: Uuid, bytes: i64) {
        if bytes <= 0 {
            return;
        }
        if let Err(e) = self.users.release_quota(user_id, bytes).await {
            error!(user_id = %user_id, bytes, error = %e, "Failed to release quota");
        }
    }

    /// Compensating delete of a blob whose metadata was never committed.
    pub(crate) async fn discard_blob(&self, storage_key: &str) {
        if let Err(e) = self.blobs.delete(storage_key).await {
            error!(storage_key, error = %e, "Compensating blob delete failed");
        }
    }

    /// The write lock of a file.
    pub(crate) fn write_lock(&self, file_id: Uuid) -> Arc<Mutex<()>> {
        self.write_locks.entry(file_id).or_default().clone()
    }

    pub(crate) fn emit(&self, event_type: EventType, file: &File, folder_id: Option<Uuid>) {
        let payload = serde_json::to_value(file).unwrap_or_default();
        self.publisher
            .publish(RealtimeEvent::new(event_type, file.owner_id, folder_id, payload));
    }
}

/// Check a file or folder name.
pub(crate) fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(AppError::validation("Name cannot be '.' or '..'"));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(AppError::validation("Name cannot contain '/'"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "Name cannot exceed {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}

fn sort_by_name(files: &mut [File]) {
    files.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;
    use nimbus_core::ErrorKind;

    #[test]
    fn names_are_validated() {
        assert!(validate_name("report.pdf").is_ok());
        for bad in ["", "   ", ".", "..", "a/b", "nul\0"] {
            assert_eq!(validate_name(bad).unwrap_err().kind, ErrorKind::Validation, "{bad:?}");
        }
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[tokio::test]
    async fn create_folder_and_list() {
        let h = Harness::new();
        let ctx = h.user(0).await;

        let docs = h.engine.create_folder(&ctx, None, "Docs").await.unwrap();
        let inner = h.engine.create_folder(&ctx, Some(docs.id), "b").await.unwrap();
        h.engine.create_folder(&ctx, Some(docs.id), "a").await.unwrap();

        let root = h.engine.list(&ctx, None).await.unwrap();
        assert_eq!(root.len(), 1);
        let names: Vec<_> = h
            .engine
            .list(&ctx, Some(docs.id))
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(inner.parent_id, Some(docs.id));
        assert_eq!(h.events.types(), vec![EventType::FileCreated; 3]);
    }

    #[tokio::test]
    async fn other_users_see_not_found() {
        let h = Harness::new();
        let alice = h.user(0).await;
        let bob = h.user(0).await;
        let folder = h.engine.create_folder(&alice, None, "Private").await.unwrap();

        assert_eq!(h.engine.get(&bob, folder.id).await.unwrap_err().kind, ErrorKind::NotFound);
        let err = h
            .engine
            .create_folder(&bob, Some(folder.id), "sneaky")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn folder_under_a_file_is_rejected() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let file = h.upload(&ctx, None, "a.txt", b"abc").await;
        let err = h
            .engine
            .create_folder(&ctx, Some(file.id), "nested")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn rename_star_and_move_emit_events() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let folder = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let file = h.upload(&ctx, Some(folder.id), "f.txt", b"data").await;
        h.events.clear();

        let renamed = h
            .engine
            .update(&ctx, file.id, FileUpdate { name: Some("g.txt".into()), is_starred: Some(true), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(renamed.name, "g.txt");
        assert!(renamed.is_starred);
        assert_eq!(h.events.last().event_type, EventType::FileUpdated);

        let moved = h
            .engine
            .update(&ctx, file.id, FileUpdate { parent_id: Some(None), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(moved.parent_id, None);
        let event = h.events.last();
        assert_eq!(event.event_type, EventType::FileMoved);
        assert_eq!(event.payload["old_folder_id"], folder.id.to_string());
        assert!(event.payload["new_folder_id"].is_null());
        assert_eq!(event.folders().collect::<Vec<_>>(), vec![folder.id]);

        let starred = h.engine.list_starred(&ctx).await.unwrap();
        assert_eq!(starred.len(), 1);
    }

    #[tokio::test]
    async fn folder_cannot_move_into_descendant() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let a = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let b = h.engine.create_folder(&ctx, Some(a.id), "B").await.unwrap();

        for target in [a.id, b.id] {
            let err = h
                .engine
                .update(&ctx, a.id, FileUpdate { parent_id: Some(Some(target)), ..Default::default() })
                .await
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }
        assert_eq!(h.engine.get(&ctx, a.id).await.unwrap().parent_id, None);
    }

    #[tokio::test]
    async fn restoring_a_live_file_is_rejected_without_change() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let a = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let f = h.upload(&ctx, Some(a.id), "f.txt", b"x").await;
        h.engine
            .update(&ctx, f.id, FileUpdate { parent_id: Some(None), ..Default::default() })
            .await
            .unwrap();
        let before = h.engine.get(&ctx, f.id).await.unwrap();
        h.events.clear();

        let err = h.engine.restore(&ctx, f.id).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(h.engine.get(&ctx, f.id).await.unwrap(), before);
        assert!(h.events.types().is_empty());
    }

    #[tokio::test]
    async fn trash_and_restore_roundtrip() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let f = h.upload(&ctx, None, "f.txt", b"x").await;

        h.engine.delete(&ctx, f.id).await.unwrap();
        assert!(h.engine.list(&ctx, None).await.unwrap().is_empty());
        assert_eq!(h.engine.list_trash(&ctx).await.unwrap().len(), 1);
        assert_eq!(h.engine.delete(&ctx, f.id).await.unwrap_err().kind, ErrorKind::Validation);

        let restored = h.engine.restore(&ctx, f.id).await.unwrap();
        assert!(!restored.is_trashed);
        assert!(restored.trashed_at.is_none());
        assert_eq!(
            h.events.types()[1..],
            [EventType::FileDeleted, EventType::FileRestored]
        );
    }

    #[tokio::test]
    async fn restore_into_trashed_parent_lands_at_root() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let a = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let f = h.upload(&ctx, Some(a.id), "f.txt", b"x").await;
        h.engine.delete(&ctx, f.id).await.unwrap();
        h.engine.delete(&ctx, a.id).await.unwrap();

        let restored = h.engine.restore(&ctx, f.id).await.unwrap();
        assert_eq!(restored.parent_id, None);
    }

    #[tokio::test]
    async fn restore_under_trashed_grandparent_lands_at_root() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let a = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let b = h.engine.create_folder(&ctx, Some(a.id), "B").await.unwrap();
        let f = h.upload(&ctx, Some(b.id), "f.txt", b"x").await;
        h.engine.delete(&ctx, f.id).await.unwrap();
        h.engine.delete(&ctx, a.id).await.unwrap();

        let restored = h.engine.restore(&ctx, f.id).await.unwrap();
        assert_eq!(restored.parent_id, None);
        let root = h.engine.list(&ctx, None).await.unwrap();
        assert!(root.iter().any(|item| item.id == f.id));

        h.engine.empty_trash(&ctx).await.unwrap();
        assert!(h.engine.get(&ctx, f.id).await.is_ok());
        assert!(h.engine.get(&ctx, b.id).await.is_err());
        assert_eq!(h.blobs.len(), 1);
    }

    #[tokio::test]
    async fn folders_under_a_trashed_ancestor_are_hidden() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let a = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let b = h.engine.create_folder(&ctx, Some(a.id), "B").await.unwrap();
        let inner = h.upload(&ctx, Some(b.id), "report-inner.txt", b"1").await;
        h.upload(&ctx, None, "report-top.txt", b"2").await;
        h.engine
            .update(
                &ctx,
                inner.id,
                FileUpdate {
                    is_starred: Some(true),
                    ..FileUpdate::default()
                },
            )
            .await
            .unwrap();
        h.engine.delete(&ctx, a.id).await.unwrap();

        let err = h.engine.list(&ctx, Some(b.id)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = h
            .engine
            .create_folder(&ctx, Some(b.id), "C")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let hits = h.engine.search(&ctx, "report").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "report-top.txt");
        assert!(h.engine.list_starred(&ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn permanent_delete_removes_blobs_versions_and_quota() {
        let h = Harness::new();
        let ctx = h.user(1000).await;
        let folder = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let f = h.upload(&ctx, Some(folder.id), "f.txt", b"first").await;
        h.engine
            .update_content(&ctx, f.id, 6, crate::test_support::body(b"second"))
            .await
            .unwrap();
        h.upload(&ctx, None, "other.txt", b"keep").await;
        assert_eq!(h.blobs.len(), 3);

        h.engine.delete(&ctx, folder.id).await.unwrap();
        h.engine.permanent_delete(&ctx, folder.id).await.unwrap();

        assert_eq!(h.blobs.len(), 1);
        assert!(h.engine.get(&ctx, f.id).await.is_err());
        let user = h.db.users.find_by_id(ctx.user_id).await.unwrap().unwrap();
        assert_eq!(user.storage_used, 4);
        assert_eq!(h.db.users.recalculate_usage(ctx.user_id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn empty_trash_counts_roots() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        let a = h.engine.create_folder(&ctx, None, "A").await.unwrap();
        let inner = h.upload(&ctx, Some(a.id), "in.txt", b"1").await;
        let loose = h.upload(&ctx, None, "loose.txt", b"2").await;
        h.engine.delete(&ctx, inner.id).await.unwrap();
        h.engine.delete(&ctx, a.id).await.unwrap();
        h.engine.delete(&ctx, loose.id).await.unwrap();

        assert_eq!(h.engine.empty_trash(&ctx).await.unwrap(), 2);
        assert!(h.engine.list_trash(&ctx).await.unwrap().is_empty());
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let h = Harness::new();
        let ctx = h.user(0).await;
        h.upload(&ctx, None, "Quarterly Report.pdf", b"1").await;
        h.upload(&ctx, None, "notes.txt", b"2").await;

        let hits = h.engine.search(&ctx, "REPORT").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Quarterly Report.pdf");
        assert!(h.engine.search(&ctx, "  ").await.is_err());
    }

    #[tokio::test]
    async fn storage_stats_break_down_by_mime() {
        let h = Harness::new();
        let ctx = h.user(200).await;
        h.upload(&ctx, None, "a.txt", &[0; 30]).await;
        h.upload(&ctx, None, "b.txt", &[0; 10]).await;
        h.upload(&ctx, None, "c.png", &[0; 10]).await;

        let stats = h.engine.storage_stats(&ctx).await.unwrap();
        assert_eq!(stats.used_bytes, 50);
        assert_eq!(stats.quota_limit, 200);
        assert!((stats.used_pct - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.by_mime_type[0].mime_type, "text/plain");
        assert_eq!(stats.by_mime_type[0].bytes, 40);
    }
}
