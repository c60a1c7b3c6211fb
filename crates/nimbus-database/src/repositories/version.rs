//! File version repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use nimbus_core::result::AppResult;
use nimbus_entity::file::{FileVersion, NewFileVersion};

use super::db_error;
use crate::traits::VersionRepository;

/// PostgreSQL-backed version history.
#[derive(Debug, Clone)]
pub struct PgVersionRepository {
    pool: PgPool,
}

impl PgVersionRepository {
    /// Create a new version repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionRepository for PgVersionRepository {
    async fn create_snapshot(&self, data: &NewFileVersion) -> AppResult<FileVersion> {
        // The unique (file_id, version) constraint turns a lost race into a conflict.
        sqlx::query_as::<_, FileVersion>(
            "INSERT INTO file_versions (id, file_id, version, size, storage_key, content_hash, created_by) \
             SELECT $1, $2, COALESCE(MAX(version), 0) + 1, $3, $4, $5, $6 \
             FROM file_versions WHERE file_id = $2 \
             RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.file_id)
        .bind(data.size)
        .bind(&data.storage_key)
        .bind(&data.content_hash)
        .bind(data.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create file version"))
    }

    async fn list(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 ORDER BY version DESC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list file versions"))
    }

    async fn find(&self, file_id: Uuid, version: i32) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 AND version = $2",
        )
        .bind(file_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find file version"))
    }
}
