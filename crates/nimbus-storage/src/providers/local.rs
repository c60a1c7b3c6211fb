//! Local filesystem blob store.

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_core::traits::{BlobStore, ByteStream};

/// Blob store backed by a directory tree.
///
/// Uploads are written to a temporary sibling and renamed into place, so a
/// reader never observes a partially written blob.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `root_path`, creating the directory if needed.
    pub async fn new(root_path: impl AsRef<Path>) -> AppResult<Self> {
        let root = root_path.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a key to a path inside the root, rejecting traversal.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::validation(format!("Invalid storage key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    async fn open(&self, key: &str) -> AppResult<fs::File> {
        let path = self.resolve(key)?;
        fs::File::open(&path).await.map_err(|e| map_not_found(e, key))
    }

    async fn write_temp(&self, temp: &Path, mut stream: ByteStream) -> AppResult<u64> {
        let mut file = fs::File::create(temp).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create file: {}", temp.display()),
                e,
            )
        })?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
            })?;
        }

        file.sync_all()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to sync file", e))?;
        Ok(written)
    }
}

fn map_not_found(e: std::io::Error, key: &str) -> AppError {
    if e.kind() == std::io::ErrorKind::NotFound {
        AppError::not_found(format!("Blob not found: {key}"))
    } else {
        AppError::with_source(ErrorKind::Storage, format!("Failed to open blob: {key}"), e)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn upload(
        &self,
        key: &str,
        stream: ByteStream,
        _size: u64,
        _mime_type: &str,
    ) -> AppResult<u64> {
        let path = self.resolve(key)?;
        self.ensure_parent(&path).await?;

        let temp = path.with_extension(format!("part-{}", Uuid::new_v4().simple()));
        let written = match self.write_temp(&temp, stream).await {
            Ok(n) => n,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp).await {
                    warn!(path = %temp.display(), error = %cleanup, "Failed to remove partial upload");
                }
                return Err(e);
            }
        };

        fs::rename(&temp, &path).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to commit blob: {key}"), e)
        })?;

        debug!(key, bytes = written, "Stored blob");
        Ok(written)
    }

    async fn download(&self, key: &str) -> AppResult<ByteStream> {
        let file = self.open(key).await?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn download_range(&self, key: &str, start: u64, end: u64) -> AppResult<ByteStream> {
        let mut file = self.open(key).await?;
        let len = file
            .metadata()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to stat blob", e))?
            .len();
        if start > end || end >= len {
            return Err(AppError::range_not_satisfiable(format!(
                "Range {start}-{end} outside blob of {len} bytes"
            )));
        }

        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to seek blob", e))?;
        let limited = file.take(end - start + 1);
        Ok(Box::pin(ReaderStream::new(limited)))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete blob: {key}"),
                e,
            )),
        }
    }

    async fn stat(&self, key: &str) -> AppResult<u64> {
        let path = self.resolve(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| map_not_found(e, key))?;
        Ok(meta.len())
    }
}
