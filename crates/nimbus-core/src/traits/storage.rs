//! Blob store trait for pluggable object storage backends.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::ErrorKind;
use crate::result::AppResult;

/// A byte stream type used for reading and writing blob contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Key-addressed binary storage.
///
/// Keys are opaque, slash-separated locators. A blob is written once and
/// never modified in place; replacing content always means a new key.
/// Implementations live in `nimbus-storage`.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Backend name (e.g. "local", "s3").
    fn provider_type(&self) -> &str;

    /// Write `stream` under `key`, returning the number of bytes written.
    ///
    /// `size` is the length announced by the caller; backends may use it as
    /// a content-length hint but must report what they actually stored.
    async fn upload(&self, key: &str, stream: ByteStream, size: u64, mime_type: &str)
    -> AppResult<u64>;

    /// Open the full blob as a stream.
    async fn download(&self, key: &str) -> AppResult<ByteStream>;

    /// Open bytes `start..=end` of the blob as a stream.
    async fn download_range(&self, key: &str, start: u64, end: u64) -> AppResult<ByteStream>;

    /// Remove the blob. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Size of the stored blob in bytes.
    async fn stat(&self, key: &str) -> AppResult<u64>;

    /// Whether a blob exists under `key`.
    async fn exists(&self, key: &str) -> AppResult<bool> {
        match self.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
