//! Share creation, listing and revocation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use nimbus_auth::PasswordHasher;
use nimbus_core::config::SharingConfig;
use nimbus_core::error::AppError;
use nimbus_core::events::{EventType, RealtimeEvent};
use nimbus_core::result::AppResult;
use nimbus_core::traits::{BlobStore, EventPublisher};
use nimbus_database::{Database, FileRepository, ShareRepository, UserRepository};
use nimbus_entity::file::File;
use nimbus_entity::share::{NewShare, Share, ShareKind, SharePermission};

use super::link::generate_token;
use crate::context::RequestContext;

/// Issues and validates user grants and public links.
#[derive(Clone)]
pub struct ShareEngine {
    pub(crate) users: Arc<dyn UserRepository>,
    pub(crate) files: Arc<dyn FileRepository>,
    pub(crate) shares: Arc<dyn ShareRepository>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) hasher: Arc<PasswordHasher>,
    publisher: Arc<dyn EventPublisher>,
    config: SharingConfig,
}

impl std::fmt::Debug for ShareEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareEngine")
            .field("config", &self.config)
            .finish()
    }
}

/// Options for a new public link.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePublicShare {
    /// Days until the link stops working.
    pub expires_in_days: Option<i64>,
    /// Password required to download.
    pub password: Option<String>,
    /// `false` makes the link view-only.
    pub allow_download: Option<bool>,
    /// Number of downloads after which the link stops working.
    pub max_downloads: Option<i32>,
}

impl ShareEngine {
    /// Creates a new share engine.
    pub fn new(
        db: &Database,
        blobs: Arc<dyn BlobStore>,
        hasher: Arc<PasswordHasher>,
        publisher: Arc<dyn EventPublisher>,
        config: SharingConfig,
    ) -> Self {
        Self {
            users: db.users.clone(),
            files: db.files.clone(),
            shares: db.shares.clone(),
            blobs,
            hasher,
            publisher,
            config,
        }
    }

    /// Create a public link to one of the caller's files.
    pub async fn create_public_share(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        options: CreatePublicShare,
    ) -> AppResult<Share> {
        let file = self.owned_file(ctx, file_id).await?;

        let expires_at = match options.expires_in_days {
            Some(days) if days < 1 || days > self.config.max_expiry_days => {
                return Err(AppError::validation(format!(
                    "expires_in_days must be between 1 and {}",
                    self.config.max_expiry_days
                )));
            }
            Some(days) => Some(Utc::now() + Duration::days(days)),
            None => None,
        };
        if options.max_downloads.is_some_and(|max| max < 1) {
            return Err(AppError::validation("max_downloads must be at least 1"));
        }
        let password_hash = match options.password.as_deref() {
            Some("") => return Err(AppError::validation("Password cannot be empty")),
            Some(password) => Some(self.hasher.hash_password(password)?),
            None => None,
        };
        let permission = if options.allow_download == Some(false) {
            SharePermission::View
        } else {
            SharePermission::Download
        };

        let share = self
            .shares
            .create(&NewShare {
                file_id,
                owner_id: ctx.user_id,
                permission,
                kind: ShareKind::Public {
                    token: generate_token(self.config.token_bytes),
                    password_hash,
                    expires_at,
                    max_downloads: options.max_downloads,
                },
            })
            .await?;

        info!(
            user_id = %ctx.user_id,
            share_id = %share.id,
            file_id = %file_id,
            protected = share.has_password(),
            "Public share created"
        );
        self.emit(EventType::ShareCreated, &share, &file);
        Ok(share)
    }

    /// Grant `target_user` access to one of the caller's files, or change
    /// the permission of an existing grant.
    pub async fn share_with_user(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        target_user: Uuid,
        permission: SharePermission,
    ) -> AppResult<Share> {
        if target_user == ctx.user_id {
            return Err(AppError::validation("Cannot share a file with yourself"));
        }
        let file = self.owned_file(ctx, file_id).await?;
        if self.users.find_by_id(target_user).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }

        let (share, created) = self
            .shares
            .upsert_user_share(file_id, ctx.user_id, target_user, permission)
            .await?;

        info!(
            user_id = %ctx.user_id,
            share_id = %share.id,
            shared_with = %target_user,
            permission = ?permission,
            created,
            "User share saved"
        );
        self.emit(EventType::ShareCreated, &share, &file);
        Ok(share)
    }

    /// Delete a share created by the caller.
    pub async fn revoke(&self, ctx: &RequestContext, share_id: Uuid) -> AppResult<()> {
        let share = self
            .shares
            .find_by_id(share_id)
            .await?
            .ok_or_else(|| AppError::not_found("Share not found"))?;
        if share.owner_id != ctx.user_id {
            return Err(AppError::forbidden("Only the owner can revoke a share"));
        }

        self.shares.delete(share_id).await?;
        info!(user_id = %ctx.user_id, share_id = %share_id, "Share revoked");

        let mut event = RealtimeEvent::new(
            EventType::ShareRevoked,
            share.owner_id,
            None,
            serde_json::to_value(&share).unwrap_or_default(),
        );
        if let ShareKind::User { shared_with } = share.kind {
            event = event.notify(shared_with);
        }
        self.publisher.publish(event);
        Ok(())
    }

    /// Shares the caller created, optionally for one file.
    pub async fn list_shares(
        &self,
        ctx: &RequestContext,
        file_id: Option<Uuid>,
    ) -> AppResult<Vec<Share>> {
        self.shares.list_by_owner(ctx.user_id, file_id).await
    }

    /// User shares granted to the caller.
    pub async fn list_shared_with_me(&self, ctx: &RequestContext) -> AppResult<Vec<Share>> {
        self.shares.list_shared_with(ctx.user_id).await
    }

    /// A live file or folder owned by the caller.
    async fn owned_file(&self, ctx: &RequestContext, file_id: Uuid) -> AppResult<File> {
        self.files
            .find_by_id(file_id)
            .await?
            .filter(|f| f.owner_id == ctx.user_id && !f.is_trashed)
            .ok_or_else(|| AppError::not_found("File not found"))
    }

    fn emit(&self, event_type: EventType, share: &Share, file: &File) {
        let payload = serde_json::json!({ "share": share, "file_name": file.name });
        let mut event = RealtimeEvent::new(event_type, share.owner_id, None, payload);
        if let ShareKind::User { shared_with } = share.kind {
            event = event.notify(shared_with);
        }
        self.publisher.publish(event);
    }
}
