//! File search handler.

use axum::Json;
use axum::extract::{Query, State};

use nimbus_entity::file::File;

use crate::dto::ApiResponse;
use crate::dto::request::{SearchQuery, validate};
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/search?q=
pub async fn search_files(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ApiResponse<Vec<File>>>> {
    validate(&query)?;
    let files = state.files.search(&auth, &query.q).await?;
    Ok(Json(ApiResponse::ok(files)))
}
