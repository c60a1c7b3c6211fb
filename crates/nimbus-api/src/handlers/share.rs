//! Share management handlers for the owner and the grantee.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use nimbus_entity::share::Share;

use crate::dto::ApiResponse;
use crate::dto::request::{
    CreatePublicShareRequest, ListSharesQuery, ShareWithUserRequest, validate,
};
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/files/{id}/shares/public
pub async fn create_public_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(file_id): Path<Uuid>,
    req: Option<Json<CreatePublicShareRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Share>>)> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    validate(&req)?;
    let share = state
        .shares
        .create_public_share(&auth, file_id, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(share))))
}

/// POST /api/files/{id}/shares/user
pub async fn share_with_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(file_id): Path<Uuid>,
    Json(req): Json<ShareWithUserRequest>,
) -> ApiResult<Json<ApiResponse<Share>>> {
    let share = state
        .shares
        .share_with_user(&auth, file_id, req.user_id, req.permission)
        .await?;
    Ok(Json(ApiResponse::ok(share)))
}

/// GET /api/shares?file_id=
pub async fn list_shares(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListSharesQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Share>>>> {
    let shares = state.shares.list_shares(&auth, query.file_id).await?;
    Ok(Json(ApiResponse::ok(shares)))
}

/// GET /api/shares/with-me
pub async fn shared_with_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<Share>>>> {
    let shares = state.shares.list_shared_with_me(&auth).await?;
    Ok(Json(ApiResponse::ok(shares)))
}

/// DELETE /api/shares/{id}
pub async fn revoke_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.shares.revoke(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
