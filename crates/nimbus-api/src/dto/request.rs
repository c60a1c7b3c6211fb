//! Request DTOs with validation.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use nimbus_core::error::AppError;
use nimbus_entity::share::SharePermission;
use nimbus_service::{CreatePublicShare, FileUpdate};

/// Turn `validator` failures into a `Validation` error.
pub fn validate(request: &impl Validate) -> Result<(), AppError> {
    request.validate().map_err(|e: ValidationErrors| {
        AppError::validation(format!("Invalid request: {e}"))
    })
}

/// `?parent_id=` on listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListFilesQuery {
    /// Folder to list; the root when absent.
    pub parent_id: Option<Uuid>,
}

/// Create folder request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateFolderRequest {
    /// Parent folder ID; the root when absent.
    pub parent_id: Option<Uuid>,
    /// Folder name.
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Rename, move or star a file.
///
/// `parent_id` distinguishes "absent" (keep) from `null` (move to root).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateFileRequest {
    /// New name.
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    /// New parent folder.
    #[serde(default, deserialize_with = "present")]
    pub parent_id: Option<Option<Uuid>>,
    /// New starred flag.
    pub is_starred: Option<bool>,
}

impl From<UpdateFileRequest> for FileUpdate {
    fn from(req: UpdateFileRequest) -> Self {
        Self {
            name: req.name,
            parent_id: req.parent_id,
            is_starred: req.is_starred,
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Copy request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyFileRequest {
    /// Destination folder; the source's folder when absent.
    pub parent_id: Option<Uuid>,
}

/// `?q=` on search.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 255))]
    pub q: String,
}

/// Public link request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreatePublicShareRequest {
    /// Days until the link expires.
    #[validate(range(min = 1))]
    pub expires_in_days: Option<i64>,
    /// Password required to download.
    #[validate(length(min = 1, max = 128))]
    pub password: Option<String>,
    /// `false` makes the link view-only.
    pub allow_download: Option<bool>,
    /// Downloads before the link stops working.
    #[validate(range(min = 1))]
    pub max_downloads: Option<i32>,
}

impl From<CreatePublicShareRequest> for CreatePublicShare {
    fn from(req: CreatePublicShareRequest) -> Self {
        Self {
            expires_in_days: req.expires_in_days,
            password: req.password,
            allow_download: req.allow_download,
            max_downloads: req.max_downloads,
        }
    }
}

/// Grant a file to another user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareWithUserRequest {
    /// Grantee.
    pub user_id: Uuid,
    /// Granted permission.
    #[serde(default = "default_permission")]
    pub permission: SharePermission,
}

fn default_permission() -> SharePermission {
    SharePermission::View
}

/// `?file_id=` on share listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSharesQuery {
    pub file_id: Option<Uuid>,
}

/// Body of a public download.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicDownloadRequest {
    pub password: Option<String>,
}

/// `?token=` carrying a stream or access token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}
