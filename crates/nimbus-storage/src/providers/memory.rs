//! In-memory blob store for tests and ephemeral deployments.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use futures::StreamExt;

use nimbus_core::error::{AppError, ErrorKind};
use nimbus_core::result::AppResult;
use nimbus_core::traits::{BlobStore, ByteStream};

/// Blob store holding every blob in a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether the store holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Keys of all stored blobs, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn get(&self, key: &str) -> AppResult<Bytes> {
        self.blobs
            .get(key)
            .map(|b| b.value().clone())
            .ok_or_else(|| AppError::not_found(format!("Blob not found: {key}")))
    }
}

fn single_chunk(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn upload(
        &self,
        key: &str,
        mut stream: ByteStream,
        size: u64,
        _mime_type: &str,
    ) -> AppResult<u64> {
        let mut buf = BytesMut::with_capacity(usize::try_from(size).unwrap_or(0).min(1 << 20));
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            buf.extend_from_slice(&chunk);
        }
        let written = buf.len() as u64;
        self.blobs.insert(key.to_string(), buf.freeze());
        Ok(written)
    }

    async fn download(&self, key: &str) -> AppResult<ByteStream> {
        Ok(single_chunk(self.get(key)?))
    }

    async fn download_range(&self, key: &str, start: u64, end: u64) -> AppResult<ByteStream> {
        let data = self.get(key)?;
        let len = data.len() as u64;
        if start > end || end >= len {
            return Err(AppError::range_not_satisfiable(format!(
                "Range {start}-{end} outside blob of {len} bytes"
            )));
        }
        // Both bounds are < len, which fits in usize.
        Ok(single_chunk(data.slice(start as usize..=end as usize)))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.blobs.remove(key);
        Ok(())
    }

    async fn stat(&self, key: &str) -> AppResult<u64> {
        Ok(self.get(key)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_and_range() {
        let store = MemoryBlobStore::new();
        let body: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ]));
        assert_eq!(store.upload("k", body, 6, "text/plain").await.unwrap(), 6);
        assert_eq!(store.keys(), vec!["k".to_string()]);

        let mut range = store.download_range("k", 1, 4).await.unwrap();
        assert_eq!(range.next().await.unwrap().unwrap(), Bytes::from_static(b"bcde"));

        store.delete("k").await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.stat("k").await.unwrap_err().kind, ErrorKind::NotFound);
    }
}
