//! Blob store selection from configuration.

use std::sync::Arc;

use tracing::info;

use nimbus_core::config::StorageConfig;
use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_core::traits::BlobStore;

use crate::providers::{LocalBlobStore, MemoryBlobStore};

/// Build the blob store named by `config.provider`.
pub async fn build_blob_store(config: &StorageConfig) -> AppResult<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.provider.as_str() {
        "local" => {
            info!(root = %config.local.root_path, "Initializing local blob store");
            Arc::new(LocalBlobStore::new(&config.local.root_path).await?)
        }
        "memory" => {
            info!("Initializing in-memory blob store");
            Arc::new(MemoryBlobStore::new())
        }
        #[cfg(feature = "s3")]
        "s3" => {
            info!(bucket = %config.s3.bucket, region = %config.s3.region, "Initializing S3 blob store");
            Arc::new(crate::providers::S3BlobStore::new(&config.s3)?)
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown storage provider: '{other}'. Supported: local, memory{}",
                if cfg!(feature = "s3") { ", s3" } else { "" }
            )));
        }
    };

    Ok(store)
}
