//! User quota repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_entity::user::User;

use super::db_error;
use crate::traits::UserRepository;

/// PostgreSQL-backed quota accounting.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find user"))
    }

    async fn ensure(&self, id: Uuid, username: &str, default_quota: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, quota_limit) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET username = users.username \
             RETURNING *",
        )
        .bind(id)
        .bind(username)
        .bind(default_quota)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to ensure user"))
    }

    async fn set_quota_limit(&self, id: Uuid, limit: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>("UPDATE users SET quota_limit = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(limit.max(0))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to set quota"))?
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }

    async fn try_reserve_quota(&self, id: Uuid, bytes: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET storage_used = storage_used + $2 \
             WHERE id = $1 AND (quota_limit = 0 OR storage_used + $2 <= quota_limit)",
        )
        .bind(id)
        .bind(bytes)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to reserve quota"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_quota(&self, id: Uuid, bytes: i64) -> AppResult<()> {
        sqlx::query("UPDATE users SET storage_used = GREATEST(storage_used - $2, 0) WHERE id = $1")
            .bind(id)
            .bind(bytes)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to release quota"))?;
        Ok(())
    }

    async fn recalculate_usage(&self, id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE users SET storage_used = ( \
                 SELECT COALESCE(SUM(size), 0)::BIGINT FROM files \
                 WHERE owner_id = $1 AND NOT is_folder \
             ) WHERE id = $1 RETURNING storage_used",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to recalculate usage"))?
        .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }
}
