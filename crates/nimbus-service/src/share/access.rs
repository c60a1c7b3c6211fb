//! Public link access: metadata lookup and counted downloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_core::traits::ByteStream;
use nimbus_entity::file::File;
use nimbus_entity::share::{Share, ShareKind};

use super::service::ShareEngine;

/// What an anonymous visitor may learn about a public link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicShareInfo {
    pub name: String,
    pub size: i64,
    pub is_folder: bool,
    pub mime_type: String,
    pub allow_download: bool,
    pub has_password: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub downloads_left: Option<i32>,
}

/// An accepted public download.
pub struct PublicDownload {
    /// The shared file.
    pub file: File,
    /// Its content.
    pub body: ByteStream,
    /// Downloads remaining after this one, when the link is limited.
    pub downloads_left: Option<i32>,
}

impl std::fmt::Debug for PublicDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicDownload")
            .field("file", &self.file.id)
            .field("downloads_left", &self.downloads_left)
            .finish()
    }
}

impl ShareEngine {
    /// Look up a public link without consuming a download.
    pub async fn resolve_public_share(&self, token: &str) -> AppResult<PublicShareInfo> {
        let share = self.live_public_share(token).await?;
        if share.is_exhausted() {
            return Err(AppError::download_limit_reached(
                "This link has reached its download limit",
            ));
        }
        let file = self.shared_file(&share).await?;

        if let Err(e) = self.shares.record_view(share.id).await {
            warn!(share_id = %share.id, error = %e, "Failed to record share view");
        }

        Ok(PublicShareInfo {
            name: file.name,
            size: file.size,
            is_folder: file.is_folder,
            mime_type: file.mime_type,
            allow_download: share.permission.allows_download(),
            has_password: share.has_password(),
            expires_at: match &share.kind {
                ShareKind::Public { expires_at, .. } => *expires_at,
                ShareKind::User { .. } => None,
            },
            downloads_left: share.downloads_left(),
        })
    }

    /// Download through a public link, consuming one download.
    ///
    /// The limit check and the increment are one conditional update, so
    /// concurrent downloads can never overshoot `max_downloads`.
    pub async fn download_public_share(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> AppResult<PublicDownload> {
        let share = self.live_public_share(token).await?;
        if !share.permission.allows_download() {
            return Err(AppError::forbidden("This link does not allow downloads"));
        }
        if share.is_exhausted() {
            return Err(AppError::download_limit_reached(
                "This link has reached its download limit",
            ));
        }
        self.check_password(&share, password)?;

        let file = self.shared_file(&share).await?;
        if file.is_folder {
            return Err(AppError::validation("Folders cannot be downloaded"));
        }
        let body = self.blobs.download(&file.storage_key).await?;

        let accepted = self
            .shares
            .try_increment_download(share.id)
            .await?
            .ok_or_else(|| {
                AppError::download_limit_reached("This link has reached its download limit")
            })?;

        info!(
            share_id = %share.id,
            file_id = %file.id,
            download_count = accepted.download_count,
            "Public share downloaded"
        );
        Ok(PublicDownload {
            file,
            body,
            downloads_left: accepted.downloads_left(),
        })
    }

    /// A public share that exists and has not expired.
    async fn live_public_share(&self, token: &str) -> AppResult<Share> {
        let share = self
            .shares
            .find_by_token(token)
            .await?
            .filter(|s| matches!(s.kind, ShareKind::Public { .. }))
            .ok_or_else(|| AppError::not_found("Share not found"))?;
        if share.is_expired_at(Utc::now()) {
            return Err(AppError::expired("This link has expired"));
        }
        Ok(share)
    }

    fn check_password(&self, share: &Share, password: Option<&str>) -> AppResult<()> {
        let ShareKind::Public {
            password_hash: Some(hash),
            ..
        } = &share.kind
        else {
            return Ok(());
        };
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::password_required("This link is password protected"))?;
        if !self.hasher.verify_password(password, hash)? {
            return Err(AppError::invalid_password("Incorrect password"));
        }
        Ok(())
    }

    async fn shared_file(&self, share: &Share) -> AppResult<File> {
        self.files
            .find_by_id(share.file_id)
            .await?
            .filter(|f| !f.is_trashed)
            .ok_or_else(|| AppError::not_found("Share not found"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use crate::share::CreatePublicShare;
    use crate::test_support::{SHARED_CONTENT, ShareHarness, collect};
    use nimbus_core::ErrorKind;
    use nimbus_entity::share::{NewShare, ShareKind, SharePermission};

    async fn public(h: &ShareHarness, options: CreatePublicShare) -> String {
        h.engine
            .create_public_share(&h.owner, h.file.id, options)
            .await
            .unwrap()
            .token()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn resolve_returns_sanitized_metadata() {
        let h = ShareHarness::new().await;
        let token = public(
            &h,
            CreatePublicShare {
                password: Some("pw".into()),
                max_downloads: Some(3),
                ..Default::default()
            },
        )
        .await;

        let info = h.engine.resolve_public_share(&token).await.unwrap();
        assert_eq!(info.name, "shared.txt");
        assert_eq!(info.size, SHARED_CONTENT.len() as i64);
        assert!(info.allow_download);
        assert!(info.has_password);
        assert_eq!(info.downloads_left, Some(3));

        let share = h.engine.shares.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(share.view_count, 1);
        assert_eq!(share.download_count, 0);
    }

    #[tokio::test]
    async fn folder_share_resolves_but_cannot_download() {
        let h = ShareHarness::new().await;
        let folder = h
            .files
            .engine
            .create_folder(&h.owner, None, "Album")
            .await
            .unwrap();
        let token = h
            .engine
            .create_public_share(&h.owner, folder.id, CreatePublicShare::default())
            .await
            .unwrap()
            .token()
            .unwrap()
            .to_string();

        let info = h.engine.resolve_public_share(&token).await.unwrap();
        assert_eq!(info.name, "Album");
        assert!(info.is_folder);

        let err = h.engine.download_public_share(&token, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        let share = h.engine.shares.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(share.download_count, 0);
    }

    #[tokio::test]
    async fn folders_can_be_shared_with_users() {
        let h = ShareHarness::new().await;
        let folder = h
            .files
            .engine
            .create_folder(&h.owner, None, "Team")
            .await
            .unwrap();

        let share = h
            .engine
            .share_with_user(&h.owner, folder.id, h.other.user_id, SharePermission::View)
            .await
            .unwrap();

        assert_eq!(share.file_id, folder.id);
        assert_eq!(h.engine.list_shared_with_me(&h.other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let h = ShareHarness::new().await;
        let err = h.engine.resolve_public_share("nope").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = h.engine.download_public_share("nope", Some("pw")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn expired_share_is_expired() {
        let h = ShareHarness::new().await;
        let share = h
            .engine
            .shares
            .create(&NewShare {
                file_id: h.file.id,
                owner_id: h.owner.user_id,
                permission: SharePermission::Download,
                kind: ShareKind::Public {
                    token: "expired-token".into(),
                    password_hash: None,
                    expires_at: Some(chrono::Utc::now() - Duration::minutes(1)),
                    max_downloads: None,
                },
            })
            .await
            .unwrap();

        let err = h.engine.resolve_public_share(share.token().unwrap()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expired);
        let err = h
            .engine
            .download_public_share("expired-token", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Expired);
    }

    #[tokio::test]
    async fn view_only_share_cannot_download() {
        let h = ShareHarness::new().await;
        let token = public(&h, CreatePublicShare { allow_download: Some(false), ..Default::default() }).await;
        let err = h.engine.download_public_share(&token, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn password_and_single_download() {
        let h = ShareHarness::new().await;
        let token = public(
            &h,
            CreatePublicShare {
                password: Some("p1".into()),
                max_downloads: Some(1),
                ..Default::default()
            },
        )
        .await;

        let err = h.engine.download_public_share(&token, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PasswordRequired);
        let err = h.engine.download_public_share(&token, Some("p2")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPassword);

        // Failed attempts consume nothing.
        let share = h.engine.shares.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(share.download_count, 0);

        let first = h.engine.download_public_share(&token, Some("p1")).await.unwrap();
        assert_eq!(first.downloads_left, Some(0));
        assert_eq!(collect(first.body).await, SHARED_CONTENT);

        let err = h.engine.download_public_share(&token, Some("p1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DownloadLimitReached);
        let err = h.engine.resolve_public_share(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DownloadLimitReached);
    }

    #[tokio::test]
    async fn concurrent_downloads_never_exceed_the_limit() {
        const LIMIT: i32 = 5;
        const ATTEMPTS: usize = 20;

        let h = ShareHarness::new().await;
        let token = public(&h, CreatePublicShare { max_downloads: Some(LIMIT), ..Default::default() }).await;
        let engine = Arc::new(h.engine.clone());

        let tasks: Vec<_> = (0..ATTEMPTS)
            .map(|_| {
                let engine = engine.clone();
                let token = token.clone();
                tokio::spawn(async move { engine.download_public_share(&token, None).await })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert_eq!(e.kind, ErrorKind::DownloadLimitReached),
            }
        }

        assert_eq!(accepted, LIMIT);
        let share = h.engine.shares.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(share.download_count, LIMIT);
    }

    #[tokio::test]
    async fn trashed_file_hides_its_links() {
        let h = ShareHarness::new().await;
        let token = public(&h, CreatePublicShare::default()).await;
        h.files.engine.delete(&h.owner, h.file.id).await.unwrap();

        let err = h.engine.resolve_public_share(&token).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
}
