//! Range streaming for media playback.
//!
//! Browsers' media elements cannot send an `Authorization` header, so a
//! client first asks for a stream token scoped to one file and then points
//! the element at `/api/stream/{id}?token=..`.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_service::{RequestContext, StreamBody};

use super::file::content_type;
use crate::dto::ApiResponse;
use crate::dto::request::TokenQuery;
use crate::dto::response::StreamTokenResponse;
use crate::error::ApiErrorResponse;
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/files/{id}/stream-token
pub async fn issue_stream_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<StreamTokenResponse>>> {
    let file = state.files.get(&auth, id).await?;
    if file.is_folder {
        return Err(AppError::validation("Folders cannot be streamed").into());
    }

    let (token, expires_at) = state.jwt_encoder.stream_token(auth.user_id, id)?;
    let url = format!("/api/stream/{id}?token={token}");
    Ok(Json(ApiResponse::ok(StreamTokenResponse {
        token,
        expires_at,
        url,
    })))
}

/// GET /api/stream/{id}?token=
pub async fn stream_with_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let claims = state.jwt_decoder.decode_stream_token(&query.token, id)?;
    let ctx = RequestContext::new(claims.sub, String::new());
    stream(&state, &ctx, id, &headers).await
}

/// GET /api/files/{id}/stream
pub async fn stream_authenticated(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    stream(&state, &auth, id, &headers).await
}

async fn stream(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let opened = state.files.open_stream(ctx, id, range).await?;
    Ok(range_response(opened)?)
}

/// Turn an opened stream into a 200, 206 or 416 response.
pub fn range_response(opened: StreamBody) -> Result<Response, AppError> {
    let response = match opened {
        StreamBody::Complete { file, body } => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type(&file))
            .header(header::CONTENT_LENGTH, file.size)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(body)),
        StreamBody::Partial { file, range, body } => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_TYPE, content_type(&file))
            .header(header::CONTENT_LENGTH, range.len())
            .header(header::CONTENT_RANGE, range.content_range(file.size.unsigned_abs()))
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::from_stream(body)),
        StreamBody::Unsatisfiable { total } => {
            return Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [
                    (header::CONTENT_RANGE, format!("bytes */{total}")),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                Json(ApiErrorResponse {
                    error: "RANGE_NOT_SATISFIABLE".to_string(),
                    message: "Requested range is not satisfiable".to_string(),
                }),
            )
                .into_response());
        }
    };
    response.map_err(|e| AppError::internal(format!("Response build failed: {e}")))
}
