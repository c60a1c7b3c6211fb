//! `AuthUser` extractor: validates the bearer JWT and injects the request
//! context.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use nimbus_core::error::AppError;
use nimbus_service::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Entries kept in the known-user cache before it is reset.
const KNOWN_USERS_CAPACITY: usize = 10_000;

/// Extracted authenticated user context available in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub RequestContext);

impl AuthUser {
    /// Returns the inner `RequestContext`.
    pub fn context(&self) -> &RequestContext {
        &self.0
    }
}

impl std::ops::Deref for AuthUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::authentication("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::authentication("Invalid Authorization header format"))?;

        let ctx = authenticate(state, token).await?;
        Ok(AuthUser(ctx))
    }
}

/// Validate an access token and make sure its user has a row.
///
/// Identities are owned by the external identity service; the first
/// request of an unknown user creates its quota row.
pub async fn authenticate(state: &AppState, token: &str) -> Result<RequestContext, AppError> {
    let claims = state.jwt_decoder.decode_access_token(token)?;
    let user_id = claims.user_id();
    let username = claims.display_name();

    if !state.known_users.contains(&user_id) {
        state
            .db
            .users
            .ensure(user_id, &username, state.config.storage.default_quota_bytes)
            .await?;
        if state.known_users.len() >= KNOWN_USERS_CAPACITY {
            state.known_users.clear();
        }
        state.known_users.insert(user_id);
        debug!(user_id = %user_id, "User row ensured");
    }

    Ok(RequestContext::new(user_id, username))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nimbus_core::config::AppConfig;
    use nimbus_database::Database;
    use nimbus_realtime::RealtimeHub;
    use nimbus_storage::MemoryBlobStore;
    use uuid::Uuid;

    use super::*;

    fn state() -> AppState {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "extractor-test-secret".to_string();
        config.auth.bcrypt_cost = 4;
        let hub = RealtimeHub::spawn(&config.realtime);
        AppState::new(
            config,
            Database::memory(),
            Arc::new(MemoryBlobStore::new()),
            hub,
        )
        .unwrap()
    }

    fn token(state: &AppState, id: Uuid, name: &str) -> String {
        state
            .jwt_encoder
            .access_token(id, name, chrono::Duration::hours(1))
            .unwrap()
    }

    #[tokio::test]
    async fn test_users_may_share_a_display_name() {
        let state = state();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let a = authenticate(&state, &token(&state, first, "sam")).await.unwrap();
        let b = authenticate(&state, &token(&state, second, "sam")).await.unwrap();

        assert_eq!(a.user_id, first);
        assert_eq!(b.user_id, second);
        assert!(state.db.users.find_by_id(second).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_known_user_cache_is_bounded() {
        let state = state();
        for _ in 0..KNOWN_USERS_CAPACITY {
            state.known_users.insert(Uuid::new_v4());
        }

        let id = Uuid::new_v4();
        authenticate(&state, &token(&state, id, "late")).await.unwrap();

        assert_eq!(state.known_users.len(), 1);
        assert!(state.known_users.contains(&id));
    }
}
