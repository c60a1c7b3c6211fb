//! Unauthenticated access to public share links.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::Response;

use nimbus_service::PublicShareInfo;

use super::file::attachment_response;
use crate::dto::ApiResponse;
use crate::dto::request::PublicDownloadRequest;
use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the downloads left on a limited link.
pub const DOWNLOADS_LEFT_HEADER: &str = "x-downloads-left";

/// GET /api/public/shares/{token}
pub async fn share_info(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ApiResponse<PublicShareInfo>>> {
    let info = state.shares.resolve_public_share(&token).await?;
    Ok(Json(ApiResponse::ok(info)))
}

/// POST /api/public/shares/{token}/download
pub async fn download(
    State(state): State<AppState>,
    Path(token): Path<String>,
    req: Option<Json<PublicDownloadRequest>>,
) -> ApiResult<Response> {
    let password = req.and_then(|Json(r)| r.password);
    let accepted = state
        .shares
        .download_public_share(&token, password.as_deref())
        .await?;

    let mut response = attachment_response(&accepted.file, accepted.body)?;
    if let Some(left) = accepted.downloads_left {
        response
            .headers_mut()
            .insert(DOWNLOADS_LEFT_HEADER, HeaderValue::from(left));
    }
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    Ok(response)
}
