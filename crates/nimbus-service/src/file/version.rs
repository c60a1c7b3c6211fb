//! Version history.

use tracing::info;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::events::EventType;
use nimbus_core::result::AppResult;
use nimbus_entity::file::{ContentUpdate, File, FileVersion};

use super::service::FileEngine;
use crate::context::RequestContext;

impl FileEngine {
    /// Versions of a file, newest first.
    pub async fn list_versions(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
    ) -> AppResult<Vec<FileVersion>> {
        let file = self.get(ctx, file_id).await?;
        if file.is_folder {
            return Err(AppError::validation("Folders have no versions"));
        }
        self.versions.list(file_id).await
    }

    /// Make `version` the current content again.
    ///
    /// The current content is snapshotted first, so restoring never loses
    /// history and can itself be undone by restoring the new snapshot.
    pub async fn restore_version(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        version: i32,
    ) -> AppResult<File> {
        let lock = self.write_lock(file_id);
        let _guard = lock.lock().await;

        let file = self.get(ctx, file_id).await?;
        if file.is_folder {
            return Err(AppError::validation("Folders have no versions"));
        }
        if file.is_trashed {
            return Err(AppError::validation("Restore the file before changing it"));
        }
        let target = self
            .versions
            .find(file_id, version)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Version {version} not found")))?;

        let delta = target.size - file.size;
        self.reserve_quota(ctx.user_id, delta).await?;

        let content = ContentUpdate {
            size: target.size,
            storage_key: target.storage_key.clone(),
            content_hash: target.content_hash.clone(),
        };
        let result = async {
            self.snapshot(ctx, &file).await?;
            self.files.replace_content(file_id, &content).await
        }
        .await;

        match result {
            Ok(restored) => {
                self.release_quota(ctx.user_id, -delta).await;
                info!(user_id = %ctx.user_id, file_id = %file_id, version, "Version restored");
                self.emit(EventType::FileUpdated, &restored, restored.parent_id);
                Ok(restored)
            }
            Err(e) => {
                self.release_quota(ctx.user_id, delta).await;
                Err(e)
            }
        }
    }
}
