//! Content writes: uploads, content replacement and copies.
//!
//! Blob and metadata writes are ordered blob first, metadata second. When
//! the metadata write fails the blob is deleted again and any quota that
//! was reserved for it is released.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::events::EventType;
use nimbus_core::result::AppResult;
use nimbus_core::traits::ByteStream;
use nimbus_entity::file::{ContentUpdate, File, NewFile, NewFileVersion};
use nimbus_storage::{HashingStream, generate_storage_key, mime_from_name};

use super::service::{FileEngine, validate_name};
use crate::context::RequestContext;

/// A blob that has been written but not yet referenced by metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// Blob locator.
    pub storage_key: String,
    /// Bytes written.
    pub size: i64,
    /// Hex SHA-256 of the content.
    pub content_hash: String,
}

impl From<StoredContent> for ContentUpdate {
    fn from(stored: StoredContent) -> Self {
        Self {
            size: stored.size,
            storage_key: stored.storage_key,
            content_hash: stored.content_hash,
        }
    }
}

fn byte_count(size: u64) -> AppResult<i64> {
    i64::try_from(size).map_err(|_| AppError::validation("File is too large"))
}

impl FileEngine {
    /// Upload a new file of `size` bytes under `parent_id`.
    pub async fn upload_file(
        &self,
        ctx: &RequestContext,
        parent_id: Option<Uuid>,
        name: &str,
        size: u64,
        content: ByteStream,
    ) -> AppResult<File> {
        validate_name(name)?;
        self.require_folder(ctx, parent_id).await?;

        let size = byte_count(size)?;
        self.reserve_quota(ctx.user_id, size).await?;

        match self.insert_file(ctx, parent_id, name, size, content).await {
            Ok(file) => {
                info!(
                    user_id = %ctx.user_id,
                    file_id = %file.id,
                    size = file.size,
                    mime_type = %file.mime_type,
                    "File uploaded"
                );
                self.emit(EventType::FileCreated, &file, file.parent_id);
                Ok(file)
            }
            Err(e) => {
                self.release_quota(ctx.user_id, size).await;
                Err(e)
            }
        }
    }

    async fn insert_file(
        &self,
        ctx: &RequestContext,
        parent_id: Option<Uuid>,
        name: &str,
        size: i64,
        content: ByteStream,
    ) -> AppResult<File> {
        let mime_type = mime_from_name(name);
        let stored = self.store_content(ctx.user_id, content, size, mime_type).await?;

        let new_file = NewFile {
            id: Uuid::now_v7(),
            parent_id,
            owner_id: ctx.user_id,
            name: name.to_string(),
            is_folder: false,
            size: stored.size,
            mime_type: mime_type.to_string(),
            storage_key: stored.storage_key.clone(),
            content_hash: stored.content_hash,
        };

        match self.files.create(&new_file).await {
            Ok(file) => Ok(file),
            Err(e) => {
                warn!(storage_key = %stored.storage_key, error = %e, "File insert failed, discarding blob");
                self.discard_blob(&stored.storage_key).await;
                Err(e)
            }
        }
    }

    /// Write `content` to a fresh key, hashing it on the way, and check
    /// that exactly `expected_size` bytes arrived.
    pub(crate) async fn store_content(
        &self,
        owner_id: Uuid,
        content: ByteStream,
        expected_size: i64,
        mime_type: &str,
    ) -> AppResult<StoredContent> {
        let storage_key = generate_storage_key(owner_id, Utc::now());
        let (hashing, digest) = HashingStream::new(content);

        let written = match self
            .blobs
            .upload(&storage_key, Box::pin(hashing), expected_size.unsigned_abs(), mime_type)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                self.discard_blob(&storage_key).await;
                return Err(e);
            }
        };

        let (content_hash, seen) = digest.finalize();
        if written != expected_size.unsigned_abs() || seen != written {
            self.discard_blob(&storage_key).await;
            return Err(AppError::validation(format!(
                "Declared size {expected_size} does not match the {written} bytes received"
            )));
        }

        Ok(StoredContent {
            storage_key,
            size: expected_size,
            content_hash,
        })
    }

    /// Replace the content of a file, keeping the previous content as a
    /// new version.
    pub async fn update_content(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        size: u64,
        content: ByteStream,
    ) -> AppResult<File> {
        let lock = self.write_lock(file_id);
        let _guard = lock.lock().await;

        let file = self.get(ctx, file_id).await?;
        if file.is_folder {
            return Err(AppError::validation("Folders have no content"));
        }
        if file.is_trashed {
            return Err(AppError::validation("Restore the file before changing it"));
        }

        let size = byte_count(size)?;
        let delta = size - file.size;
        self.reserve_quota(ctx.user_id, delta).await?;

        match self.replace_with_upload(ctx, &file, size, content).await {
            Ok(updated) => {
                self.release_quota(ctx.user_id, -delta).await;
                info!(
                    user_id = %ctx.user_id,
                    file_id = %file_id,
                    old_size = file.size,
                    new_size = updated.size,
                    "File content updated"
                );
                self.emit(EventType::FileUpdated, &updated, updated.parent_id);
                Ok(updated)
            }
            Err(e) => {
                self.release_quota(ctx.user_id, delta).await;
                Err(e)
            }
        }
    }

    async fn replace_with_upload(
        &self,
        ctx: &RequestContext,
        file: &File,
        size: i64,
        content: ByteStream,
    ) -> AppResult<File> {
        self.snapshot(ctx, file).await?;

        let stored = self
            .store_content(ctx.user_id, content, size, &file.mime_type)
            .await?;
        let key = stored.storage_key.clone();

        match self.files.replace_content(file.id, &stored.into()).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                warn!(storage_key = %key, file_id = %file.id, error = %e, "Content update failed, discarding blob");
                self.discard_blob(&key).await;
                Err(e)
            }
        }
    }

    /// Freeze the current content of `file` as its next version.
    pub(crate) async fn snapshot(&self, ctx: &RequestContext, file: &File) -> AppResult<()> {
        let version = self
            .versions
            .create_snapshot(&NewFileVersion {
                file_id: file.id,
                size: file.size,
                storage_key: file.storage_key.clone(),
                content_hash: file.content_hash.clone(),
                created_by: ctx.user_id,
            })
            .await?;
        info!(file_id = %file.id, version = version.version, "Version snapshot created");
        Ok(())
    }

    /// Copy a file into `dest_parent`, or next to the source when `None`.
    ///
    /// The copy is a full upload with its own quota check and blob.
    pub async fn copy_file(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        dest_parent: Option<Uuid>,
    ) -> AppResult<File> {
        let source = self.get(ctx, file_id).await?;
        if source.is_folder {
            return Err(AppError::not_implemented("Copying folders is not supported"));
        }
        if source.is_trashed {
            return Err(AppError::validation("Restore the file before copying it"));
        }

        let target = dest_parent.or(source.parent_id);
        let content = self.blobs.download(&source.storage_key).await?;
        let copy = self
            .upload_file(ctx, target, &source.name, source.size.unsigned_abs(), content)
            .await?;

        info!(user_id = %ctx.user_id, source_id = %file_id, new_id = %copy.id, "File copied");
        Ok(copy)
    }
}
