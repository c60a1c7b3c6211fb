//! Share repository implementation.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use nimbus_core::result::AppResult;
use nimbus_entity::share::{NewShare, Share, ShareKind, SharePermission, ShareRow};

use super::db_error;
use crate::traits::ShareRepository;

/// Repository for user shares and public links.
#[derive(Debug, Clone)]
pub struct PgShareRepository {
    pool: PgPool,
}

/// Upsert result row carrying the insert flag.
#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    share: ShareRow,
    inserted: bool,
}

impl PgShareRepository {
    /// Create a new share repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_shares(rows: Vec<ShareRow>) -> AppResult<Vec<Share>> {
    rows.into_iter().map(Share::try_from).collect()
}

#[async_trait]
impl ShareRepository for PgShareRepository {
    async fn create(&self, data: &NewShare) -> AppResult<Share> {
        let (shared_with, token, password_hash, expires_at, max_downloads) = match &data.kind {
            ShareKind::User { shared_with } => (Some(*shared_with), None, None, None, None),
            ShareKind::Public {
                token,
                password_hash,
                expires_at,
                max_downloads,
            } => (
                None,
                Some(token.clone()),
                password_hash.clone(),
                *expires_at,
                *max_downloads,
            ),
        };

        let row = sqlx::query_as::<_, ShareRow>(
            "INSERT INTO shares (id, file_id, owner_id, shared_with, token, permission, \
                                 password_hash, expires_at, max_downloads) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(data.file_id)
        .bind(data.owner_id)
        .bind(shared_with)
        .bind(token)
        .bind(data.permission)
        .bind(password_hash)
        .bind(expires_at)
        .bind(max_downloads)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create share"))?;

        Share::try_from(row)
    }

    async fn upsert_user_share(
        &self,
        file_id: Uuid,
        owner_id: Uuid,
        shared_with: Uuid,
        permission: SharePermission,
    ) -> AppResult<(Share, bool)> {
        // xmax is zero only for a freshly inserted tuple.
        let row = sqlx::query_as::<_, UpsertRow>(
            "INSERT INTO shares (id, file_id, owner_id, shared_with, permission) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (file_id, shared_with) WHERE shared_with IS NOT NULL \
             DO UPDATE SET permission = EXCLUDED.permission \
             RETURNING *, (xmax = 0) AS inserted",
        )
        .bind(Uuid::now_v7())
        .bind(file_id)
        .bind(owner_id)
        .bind(shared_with)
        .bind(permission)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to upsert user share"))?;

        Ok((Share::try_from(row.share)?, row.inserted))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, ShareRow>("SELECT * FROM shares WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find share"))?
            .map(Share::try_from)
            .transpose()
    }

    async fn find_by_token(&self, token: &str) -> AppResult<Option<Share>> {
        sqlx::query_as::<_, ShareRow>("SELECT * FROM shares WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find share by token"))?
            .map(Share::try_from)
            .transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid, file_id: Option<Uuid>) -> AppResult<Vec<Share>> {
        let rows = sqlx::query_as::<_, ShareRow>(
            "SELECT * FROM shares WHERE owner_id = $1 AND ($2::UUID IS NULL OR file_id = $2) \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_id)
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list shares"))?;
        into_shares(rows)
    }

    async fn list_shared_with(&self, user_id: Uuid) -> AppResult<Vec<Share>> {
        let rows = sqlx::query_as::<_, ShareRow>(
            "SELECT * FROM shares WHERE shared_with = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list shares with user"))?;
        into_shares(rows)
    }

    async fn try_increment_download(&self, id: Uuid) -> AppResult<Option<Share>> {
        // Check and increment in one statement: concurrent callers serialize
        // on the row lock and re-evaluate the predicate.
        sqlx::query_as::<_, ShareRow>(
            "UPDATE shares SET download_count = download_count + 1, last_accessed_at = NOW() \
             WHERE id = $1 AND (max_downloads IS NULL OR download_count < max_downloads) \
             RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to increment download count"))?
        .map(Share::try_from)
        .transpose()
    }

    async fn record_view(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE shares SET view_count = view_count + 1, last_accessed_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record share view"))?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM shares WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete share"))?;
        Ok(result.rows_affected() > 0)
    }
}
