//! File repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_entity::file::{ContentUpdate, File, FilePatch, NewFile};
use nimbus_entity::storage::MimeUsage;

use super::db_error;
use crate::traits::FileRepository;

/// Repository for file and folder rows.
#[derive(Debug, Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    /// Create a new file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find file"))
    }

    async fn list_children(&self, owner_id: Uuid, parent_id: Option<Uuid>) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 AND NOT is_trashed \
             ORDER BY name ASC, id ASC",
        )
        .bind(owner_id)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list files"))
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE owner_id = $1 AND is_trashed \
             ORDER BY trashed_at DESC, id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list trash"))
    }

    async fn list_starred(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE owner_id = $1 AND is_starred AND NOT is_trashed \
             ORDER BY name ASC, id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list starred files"))
    }

    async fn search(&self, owner_id: Uuid, query: &str, limit: i64) -> AppResult<Vec<File>> {
        let pattern = format!("%{}%", escape_like(query));
        sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE owner_id = $1 AND NOT is_trashed AND name ILIKE $2 ESCAPE '\\' \
             ORDER BY name ASC, id ASC LIMIT $3",
        )
        .bind(owner_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to search files"))
    }

    async fn list_subtree(&self, id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "WITH RECURSIVE tree AS ( \
                 SELECT * FROM files WHERE id = $1 \
                 UNION ALL \
                 SELECT f.* FROM files f JOIN tree t ON f.parent_id = t.id \
             ) SELECT * FROM tree",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load file subtree"))
    }

    async fn create(&self, data: &NewFile) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "INSERT INTO files (id, parent_id, owner_id, name, is_folder, size, mime_type, storage_key, content_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(data.id)
        .bind(data.parent_id)
        .bind(data.owner_id)
        .bind(&data.name)
        .bind(data.is_folder)
        .bind(data.size)
        .bind(&data.mime_type)
        .bind(&data.storage_key)
        .bind(&data.content_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create file"))
    }

    async fn update_metadata(&self, id: Uuid, patch: &FilePatch) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET \
                 name = COALESCE($2, name), \
                 parent_id = CASE WHEN $3 THEN $4 ELSE parent_id END, \
                 is_starred = COALESCE($5, is_starred), \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.parent_id.is_some())
        .bind(patch.parent_id.flatten())
        .bind(patch.is_starred)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update file"))?
        .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }

    async fn replace_content(&self, id: Uuid, content: &ContentUpdate) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET size = $2, storage_key = $3, content_hash = $4, updated_at = NOW() \
             WHERE id = $1 AND NOT is_folder RETURNING *",
        )
        .bind(id)
        .bind(content.size)
        .bind(&content.storage_key)
        .bind(&content.content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to replace file content"))?
        .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }

    async fn set_trashed(&self, id: Uuid, trashed: bool) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET is_trashed = $2, \
                 trashed_at = CASE WHEN $2 THEN NOW() ELSE NULL END, \
                 updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(trashed)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update trash state"))?
        .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete file"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn usage_by_mime_type(&self, owner_id: Uuid) -> AppResult<(i64, Vec<MimeUsage>)> {
        let usage = sqlx::query_as::<_, MimeUsage>(
            "SELECT mime_type, COALESCE(SUM(size), 0)::BIGINT AS bytes, COUNT(*) AS count \
             FROM files WHERE owner_id = $1 AND NOT is_folder \
             GROUP BY mime_type ORDER BY bytes DESC, mime_type ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to aggregate storage usage"))?;

        let file_count = usage.iter().map(|u| u.count).sum();
        Ok((file_count, usage))
    }
}

/// Escape `%`, `_` and `\` so user input matches literally in `LIKE`.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
