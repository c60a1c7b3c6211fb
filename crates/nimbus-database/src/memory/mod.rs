//! In-process repository backend.
//!
//! All four repository traits are implemented on one [`MemoryDatabase`]
//! so cascades behave like the foreign keys in the SQL schema. A single
//! mutex guards the state; each trait method holds it for the whole
//! operation, which gives the conditional updates the same atomicity as
//! their SQL counterparts.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_entity::file::{ContentUpdate, File, FilePatch, FileVersion, NewFile, NewFileVersion};
use nimbus_entity::share::{NewShare, Share, ShareKind, SharePermission};
use nimbus_entity::storage::MimeUsage;
use nimbus_entity::user::User;

use crate::traits::{FileRepository, ShareRepository, UserRepository, VersionRepository};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    files: HashMap<Uuid, File>,
    versions: HashMap<Uuid, Vec<FileVersion>>,
    shares: HashMap<Uuid, Share>,
}

impl MemoryState {
    fn subtree_ids(&self, root: Uuid) -> Vec<Uuid> {
        if !self.files.contains_key(&root) {
            return Vec::new();
        }
        let mut ids = vec![root];
        let mut cursor = 0;
        while cursor < ids.len() {
            let parent = ids[cursor];
            ids.extend(
                self.files
                    .values()
                    .filter(|f| f.parent_id == Some(parent))
                    .map(|f| f.id),
            );
            cursor += 1;
        }
        ids
    }

    fn file_mut(&mut self, id: Uuid) -> AppResult<&mut File> {
        self.files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }
}

fn sorted_by_name(mut files: Vec<File>) -> Vec<File> {
    files.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    files
}

fn newest_first(mut shares: Vec<Share>) -> Vec<Share> {
    shares.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    shares
}

/// In-memory metadata store used by tests and `memory://` deployments.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn ensure(&self, id: Uuid, username: &str, default_quota: i64) -> AppResult<User> {
        let mut state = self.state.lock().await;
        let user = state.users.entry(id).or_insert_with(|| User {
            id,
            username: username.to_string(),
            quota_limit: default_quota.max(0),
            storage_used: 0,
            created_at: Utc::now(),
        });
        Ok(user.clone())
    }

    async fn set_quota_limit(&self, id: Uuid, limit: i64) -> AppResult<User> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.quota_limit = limit.max(0);
        Ok(user.clone())
    }

    async fn try_reserve_quota(&self, id: Uuid, bytes: i64) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(false);
        };
        if user.quota().would_exceed(bytes) {
            return Ok(false);
        }
        user.storage_used += bytes;
        Ok(true)
    }

    async fn release_quota(&self, id: Uuid, bytes: i64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.get_mut(&id) {
            user.storage_used = (user.storage_used - bytes).max(0);
        }
        Ok(())
    }

    async fn recalculate_usage(&self, id: Uuid) -> AppResult<i64> {
        let mut state = self.state.lock().await;
        let used: i64 = state
            .files
            .values()
            .filter(|f| f.owner_id == id && !f.is_folder)
            .map(|f| f.size)
            .sum();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.storage_used = used;
        Ok(used)
    }
}

#[async_trait]
impl FileRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        Ok(self.state.lock().await.files.get(&id).cloned())
    }

    async fn list_children(&self, owner_id: Uuid, parent_id: Option<Uuid>) -> AppResult<Vec<File>> {
        let state = self.state.lock().await;
        Ok(sorted_by_name(
            state
                .files
                .values()
                .filter(|f| f.owner_id == owner_id && f.parent_id == parent_id && !f.is_trashed)
                .cloned()
                .collect(),
        ))
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        let state = self.state.lock().await;
        let mut files: Vec<File> = state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && f.is_trashed)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.trashed_at.cmp(&a.trashed_at).then(a.id.cmp(&b.id)));
        Ok(files)
    }

    async fn list_starred(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        let state = self.state.lock().await;
        Ok(sorted_by_name(
            state
                .files
                .values()
                .filter(|f| f.owner_id == owner_id && f.is_starred && !f.is_trashed)
                .cloned()
                .collect(),
        ))
    }

    async fn search(&self, owner_id: Uuid, query: &str, limit: i64) -> AppResult<Vec<File>> {
        let needle = query.to_lowercase();
        let state = self.state.lock().await;
        let mut files = sorted_by_name(
            state
                .files
                .values()
                .filter(|f| {
                    f.owner_id == owner_id
                        && !f.is_trashed
                        && f.name.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect(),
        );
        files.truncate(limit.max(0) as usize);
        Ok(files)
    }

    async fn list_subtree(&self, id: Uuid) -> AppResult<Vec<File>> {
        let state = self.state.lock().await;
        Ok(state
            .subtree_ids(id)
            .into_iter()
            .filter_map(|id| state.files.get(&id).cloned())
            .collect())
    }

    async fn create(&self, data: &NewFile) -> AppResult<File> {
        let mut state = self.state.lock().await;
        if state.files.contains_key(&data.id) {
            return Err(AppError::conflict(format!("File {} already exists", data.id)));
        }
        if let Some(parent) = data.parent_id {
            if !state.files.contains_key(&parent) {
                return Err(AppError::database(format!("Parent {parent} does not exist")));
            }
        }
        if !state.users.contains_key(&data.owner_id) {
            return Err(AppError::database(format!("Owner {} does not exist", data.owner_id)));
        }

        let now = Utc::now();
        let file = File {
            id: data.id,
            parent_id: data.parent_id,
            owner_id: data.owner_id,
            name: data.name.clone(),
            is_folder: data.is_folder,
            size: data.size,
            mime_type: data.mime_type.clone(),
            storage_key: data.storage_key.clone(),
            content_hash: data.content_hash.clone(),
            is_starred: false,
            is_trashed: false,
            trashed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.files.insert(file.id, file.clone());
        Ok(file)
    }

    async fn update_metadata(&self, id: Uuid, patch: &FilePatch) -> AppResult<File> {
        let mut state = self.state.lock().await;
        let file = state.file_mut(id)?;
        if let Some(name) = &patch.name {
            file.name = name.clone();
        }
        if let Some(parent_id) = patch.parent_id {
            file.parent_id = parent_id;
        }
        if let Some(starred) = patch.is_starred {
            file.is_starred = starred;
        }
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn replace_content(&self, id: Uuid, content: &ContentUpdate) -> AppResult<File> {
        let mut state = self.state.lock().await;
        let file = state.file_mut(id)?;
        if file.is_folder {
            return Err(AppError::not_found(format!("File {id} not found")));
        }
        file.size = content.size;
        file.storage_key = content.storage_key.clone();
        file.content_hash = content.content_hash.clone();
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn set_trashed(&self, id: Uuid, trashed: bool) -> AppResult<File> {
        let mut state = self.state.lock().await;
        let file = state.file_mut(id)?;
        let now = Utc::now();
        file.is_trashed = trashed;
        file.trashed_at = trashed.then_some(now);
        file.updated_at = now;
        Ok(file.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let removed: HashSet<Uuid> = state.subtree_ids(id).into_iter().collect();
        if removed.is_empty() {
            return Ok(false);
        }
        state.files.retain(|fid, _| !removed.contains(fid));
        state.versions.retain(|fid, _| !removed.contains(fid));
        state.shares.retain(|_, s| !removed.contains(&s.file_id));
        Ok(true)
    }

    async fn usage_by_mime_type(&self, owner_id: Uuid) -> AppResult<(i64, Vec<MimeUsage>)> {
        let state = self.state.lock().await;
        let mut by_mime: HashMap<&str, (i64, i64)> = HashMap::new();
        for file in state
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && !f.is_folder)
        {
            let entry = by_mime.entry(file.mime_type.as_str()).or_default();
            entry.0 += file.size;
            entry.1 += 1;
        }

        let mut usage: Vec<MimeUsage> = by_mime
            .into_iter()
            .map(|(mime_type, (bytes, count))| MimeUsage {
                mime_type: mime_type.to_string(),
                bytes,
                count,
            })
            .collect();
        usage.sort_by(|a, b| b.bytes.cmp(&a.bytes).then(a.mime_type.cmp(&b.mime_type)));

        let file_count = usage.iter().map(|u| u.count).sum();
        Ok((file_count, usage))
    }
}

#[async_trait]
impl VersionRepository for MemoryDatabase {
    async fn create_snapshot(&self, data: &NewFileVersion) -> AppResult<FileVersion> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(&data.file_id) {
            return Err(AppError::database(format!("File {} does not exist", data.file_id)));
        }
        let history = state.versions.entry(data.file_id).or_default();
        let next = history.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        let version = FileVersion {
            id: Uuid::now_v7(),
            file_id: data.file_id,
            version: next,
            size: data.size,
            storage_key: data.storage_key.clone(),
            content_hash: data.content_hash.clone(),
            created_by: data.created_by,
            created_at: Utc::now(),
        };
        history.push(version.clone());
        Ok(version)
    }

    async fn list(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        let state = self.state.lock().await;
        let mut versions = state.versions.get(&file_id).cloned().unwrap_or_default();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    async fn find(&self, file_id: Uuid, version: i32) -> AppResult<Option<FileVersion>> {
        let state = self.state.lock().await;
        Ok(state
            .versions
            .get(&file_id)
            .and_then(|history| history.iter().find(|v| v.version == version).cloned()))
    }
}

#[async_trait]
impl ShareRepository for MemoryDatabase {
    async fn create(&self, data: &NewShare) -> AppResult<Share> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(&data.file_id) {
            return Err(AppError::database(format!("File {} does not exist", data.file_id)));
        }
        if let ShareKind::Public { token, .. } = &data.kind {
            if state.shares.values().any(|s| s.token() == Some(token)) {
                return Err(AppError::conflict("Failed to create share: duplicate entry"));
            }
        }
        let share = data.clone().into_share();
        state.shares.insert(share.id, share.clone());
        Ok(share)
    }

    async fn upsert_user_share(
        &self,
        file_id: Uuid,
        owner_id: Uuid,
        shared_with: Uuid,
        permission: SharePermission,
    ) -> AppResult<(Share, bool)> {
        let mut state = self.state.lock().await;
        let existing = state.shares.values_mut().find(|s| {
            s.file_id == file_id
                && matches!(s.kind, ShareKind::User { shared_with: w } if w == shared_with)
        });
        if let Some(share) = existing {
            share.permission = permission;
            return Ok((share.clone(), false));
        }
        if !state.files.contains_key(&file_id) {
            return Err(AppError::database(format!("File {file_id} does not exist")));
        }

        let share = NewShare {
            file_id,
            owner_id,
            permission,
            kind: ShareKind::User { shared_with },
        }
        .into_share();
        state.shares.insert(share.id, share.clone());
        Ok((share, true))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Share>> {
        Ok(self.state.lock().await.shares.get(&id).cloned())
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Share>> {
        let state = self.state.lock().await;
        Ok(state.shares.values().find(|s| s.token() == Some(token)).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid, file_id: Option<Uuid>) -> AppResult<Vec<Share>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .shares
                .values()
                .filter(|s| s.owner_id == owner_id && file_id.is_none_or(|f| f == s.file_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list_shared_with(&self, user_id: Uuid) -> AppResult<Vec<Share>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .shares
                .values()
                .filter(|s| matches!(s.kind, ShareKind::User { shared_with } if shared_with == user_id))
                .cloned()
                .collect(),
        ))
    }

    async fn try_increment_download(&self, id: Uuid) -> AppResult<Option<Share>> {
        let mut state = self.state.lock().await;
        let Some(share) = state.shares.get_mut(&id) else {
            return Ok(None);
        };
        if share.is_exhausted() {
            return Ok(None);
        }
        share.download_count += 1;
        share.last_accessed_at = Some(Utc::now());
        Ok(Some(share.clone()))
    }

    async fn record_view(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(share) = state.shares.get_mut(&id) {
            share.view_count += 1;
            share.last_accessed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.state.lock().await.shares.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryDatabase, Uuid) {
        let db = MemoryDatabase::new();
        let owner = Uuid::new_v4();
        UserRepository::ensure(&db, owner, "alice", 0).await.unwrap();
        (db, owner)
    }

    fn new_file(owner: Uuid, parent: Option<Uuid>, name: &str, size: i64) -> NewFile {
        NewFile {
            id: Uuid::now_v7(),
            parent_id: parent,
            owner_id: owner,
            name: name.to_string(),
            is_folder: false,
            size,
            mime_type: "text/plain".to_string(),
            storage_key: format!("{owner}/{name}"),
            content_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn reserve_quota_is_conditional() {
        let (db, owner) = seeded().await;
        db.set_quota_limit(owner, 100).await.unwrap();

        assert!(db.try_reserve_quota(owner, 95).await.unwrap());
        assert!(!db.try_reserve_quota(owner, 10).await.unwrap());
        assert!(db.try_reserve_quota(owner, 5).await.unwrap());

        db.release_quota(owner, 500).await.unwrap();
        let user = UserRepository::find_by_id(&db, owner).await.unwrap().unwrap();
        assert_eq!(user.storage_used, 0);
    }

    #[tokio::test]
    async fn delete_cascades_to_children_versions_and_shares() {
        let (db, owner) = seeded().await;
        let folder = FileRepository::create(&db, &NewFile::folder(owner, None, "A"))
            .await
            .unwrap();
        let file = FileRepository::create(&db, &new_file(owner, Some(folder.id), "f.txt", 3))
            .await
            .unwrap();
        db.create_snapshot(&NewFileVersion {
            file_id: file.id,
            size: 1,
            storage_key: "old".into(),
            content_hash: String::new(),
            created_by: owner,
        })
        .await
        .unwrap();
        db.upsert_user_share(file.id, owner, Uuid::new_v4(), SharePermission::View)
            .await
            .unwrap();

        assert!(FileRepository::delete(&db, folder.id).await.unwrap());

        assert!(FileRepository::find_by_id(&db, file.id).await.unwrap().is_none());
        assert!(VersionRepository::list(&db, file.id).await.unwrap().is_empty());
        assert!(db.list_by_owner(owner, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshots_are_numbered_sequentially() {
        let (db, owner) = seeded().await;
        let file = FileRepository::create(&db, &new_file(owner, None, "v.txt", 1))
            .await
            .unwrap();

        for _ in 0..3 {
            db.create_snapshot(&NewFileVersion {
                file_id: file.id,
                size: 1,
                storage_key: "k".into(),
                content_hash: String::new(),
                created_by: owner,
            })
            .await
            .unwrap();
        }

        let numbers: Vec<i32> = VersionRepository::list(&db, file.id)
            .await
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn upsert_updates_existing_grant() {
        let (db, owner) = seeded().await;
        let file = FileRepository::create(&db, &new_file(owner, None, "s.txt", 1))
            .await
            .unwrap();
        let grantee = Uuid::new_v4();

        let (first, created) = db
            .upsert_user_share(file.id, owner, grantee, SharePermission::View)
            .await
            .unwrap();
        assert!(created);
        let (second, created) = db
            .upsert_user_share(file.id, owner, grantee, SharePermission::Edit)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.permission, SharePermission::Edit);
        assert_eq!(db.list_shared_with(grantee).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn increment_stops_at_limit() {
        let (db, owner) = seeded().await;
        let file = FileRepository::create(&db, &new_file(owner, None, "d.txt", 1))
            .await
            .unwrap();
        let share = ShareRepository::create(
            &db,
            &NewShare {
                file_id: file.id,
                owner_id: owner,
                permission: SharePermission::Download,
                kind: ShareKind::Public {
                    token: "tok".into(),
                    password_hash: None,
                    expires_at: None,
                    max_downloads: Some(2),
                },
            },
        )
        .await
        .unwrap();

        assert!(db.try_increment_download(share.id).await.unwrap().is_some());
        assert!(db.try_increment_download(share.id).await.unwrap().is_some());
        assert!(db.try_increment_download(share.id).await.unwrap().is_none());

        let stored = ShareRepository::find_by_id(&db, share.id).await.unwrap().unwrap();
        assert_eq!(stored.download_count, 2);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_skips_trash() {
        let (db, owner) = seeded().await;
        FileRepository::create(&db, &new_file(owner, None, "Quarterly Report.pdf", 1))
            .await
            .unwrap();
        let trashed = FileRepository::create(&db, &new_file(owner, None, "report-old.pdf", 1))
            .await
            .unwrap();
        db.set_trashed(trashed.id, true).await.unwrap();

        let hits = db.search(owner, "REPORT", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Quarterly Report.pdf");
    }
}
