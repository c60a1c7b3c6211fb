//! S3-compatible object storage backend (requires the `s3` feature).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream as S3Body;
use bytes::BytesMut;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use nimbus_core::config::S3StorageConfig;
use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_core::traits::{BlobStore, ByteStream};

/// Blob store backed by an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Build a client from static credentials.
    pub fn new(config: &S3StorageConfig) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::configuration("storage.s3.bucket must be set"));
        }

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "nimbus-config",
        );
        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    async fn get(&self, key: &str, range: Option<String>) -> AppResult<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    AppError::not_found(format!("Blob not found: {key}"))
                } else {
                    AppError::with_source(ErrorKind::Storage, format!("S3 get failed: {key}"), e)
                }
            })?;
        Ok(Box::pin(ReaderStream::new(output.body.into_async_read())))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn upload(
        &self,
        key: &str,
        mut stream: ByteStream,
        size: u64,
        mime_type: &str,
    ) -> AppResult<u64> {
        // PutObject needs a sized body; buffer the stream before sending.
        let mut buf = BytesMut::with_capacity(usize::try_from(size).unwrap_or(0).min(8 << 20));
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            buf.extend_from_slice(&chunk);
        }
        let written = buf.len() as u64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime_type)
            .body(S3Body::from(buf.freeze()))
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, format!("S3 put failed: {key}"), e)
            })?;

        debug!(key, bytes = written, bucket = %self.bucket, "Stored blob");
        Ok(written)
    }

    async fn download(&self, key: &str) -> AppResult<ByteStream> {
        self.get(key, None).await
    }

    async fn download_range(&self, key: &str, start: u64, end: u64) -> AppResult<ByteStream> {
        let len = self.stat(key).await?;
        if start > end || end >= len {
            return Err(AppError::range_not_satisfiable(format!(
                "Range {start}-{end} outside blob of {len} bytes"
            )));
        }
        self.get(key, Some(format!("bytes={start}-{end}"))).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        // S3 DeleteObject succeeds for missing keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, format!("S3 delete failed: {key}"), e)
            })?;
        Ok(())
    }

    async fn stat(&self, key: &str) -> AppResult<u64> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_not_found()) {
                    AppError::not_found(format!("Blob not found: {key}"))
                } else {
                    AppError::with_source(ErrorKind::Storage, format!("S3 head failed: {key}"), e)
                }
            })?;
        Ok(head.content_length().unwrap_or(0).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_required() {
        let err = S3BlobStore::new(&S3StorageConfig::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
