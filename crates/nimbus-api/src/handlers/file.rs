//! File and folder handlers: CRUD, upload, download, trash and versions.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::traits::ByteStream;
use nimbus_entity::file::{File, FileVersion};
use nimbus_entity::storage::StorageStats;
use nimbus_service::RequestContext;

use crate::dto::ApiResponse;
use crate::dto::request::{
    CopyFileRequest, CreateFolderRequest, ListFilesQuery, UpdateFileRequest, validate,
};
use crate::dto::response::EmptyTrashResponse;
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::state::AppState;

type JsonResult<T> = ApiResult<Json<ApiResponse<T>>>;

/// GET /api/files?parent_id=
pub async fn list_files(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListFilesQuery>,
) -> JsonResult<Vec<File>> {
    let files = state.files.list(&auth, query.parent_id).await?;
    Ok(Json(ApiResponse::ok(files)))
}

/// POST /api/files (multipart: optional `parent_id`, optional `name`,
/// `size`, then `file`)
///
/// The file part is streamed into the blob store, so the text fields must
/// precede it. `size` may be omitted when the file part carries its own
/// `Content-Length`.
pub async fn upload_file(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<File>>)> {
    let mut parent_id: Option<Uuid> = None;
    let mut name: Option<String> = None;
    let mut size: Option<u64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "parent_id" => {
                let text = field_text(field).await?;
                if !text.trim().is_empty() {
                    parent_id = Some(
                        Uuid::parse_str(text.trim())
                            .map_err(|_| AppError::validation("Invalid parent_id"))?,
                    );
                }
            }
            "name" => name = Some(field_text(field).await?),
            "size" => {
                let text = field_text(field).await?;
                size = Some(
                    text.trim()
                        .parse()
                        .map_err(|_| AppError::validation("Invalid size"))?,
                );
            }
            "file" => {
                let name = name
                    .or_else(|| field.file_name().map(String::from))
                    .ok_or_else(|| AppError::validation("File name is required"))?;
                let size = size
                    .or_else(|| content_length(field.headers()))
                    .ok_or_else(|| AppError::validation("size must be sent before file"))?;

                let file = stream_upload(&state, &auth, parent_id, &name, size, field).await?;
                return Ok((StatusCode::CREATED, Json(ApiResponse::ok(file))));
            }
            _ => {}
        }
    }

    Err(AppError::validation("file is required").into())
}

/// Chunks buffered between the multipart reader and the blob store.
const UPLOAD_CHANNEL_DEPTH: usize = 8;

/// Pump a multipart field into `upload_file` through a bounded channel,
/// failing the stream once more than `size` bytes arrive.
async fn stream_upload(
    state: &AppState,
    ctx: &RequestContext,
    parent_id: Option<Uuid>,
    name: &str,
    size: u64,
    mut field: Field<'_>,
) -> Result<File, AppError> {
    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(UPLOAD_CHANNEL_DEPTH);
    let content: ByteStream = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }));

    let pump = async move {
        let mut received: u64 = 0;
        loop {
            let item = match field.chunk().await {
                Ok(Some(chunk)) => {
                    received += chunk.len() as u64;
                    if received > size {
                        let _ = tx
                            .send(Err(std::io::Error::other("upload exceeds declared size")))
                            .await;
                        return true;
                    }
                    Ok(chunk)
                }
                Ok(None) => return false,
                Err(e) => Err(std::io::Error::other(e)),
            };
            let failed = item.is_err();
            // A closed channel means the engine already gave up.
            if tx.send(item).await.is_err() || failed {
                return false;
            }
        }
    };

    let (result, overran) = tokio::join!(
        state.files.upload_file(ctx, parent_id, name, size, content),
        pump
    );
    if overran {
        return Err(AppError::validation(format!(
            "Upload is larger than the declared {size} bytes"
        )));
    }
    result
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::validation(format!("Read error: {e}")))
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// POST /api/folders
pub async fn create_folder(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateFolderRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<File>>)> {
    validate(&req)?;
    let folder = state
        .files
        .create_folder(&auth, req.parent_id, &req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(folder))))
}

/// GET /api/files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> JsonResult<File> {
    let file = state.files.get(&auth, id).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// PATCH /api/files/{id}
pub async fn update_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateFileRequest>,
) -> JsonResult<File> {
    validate(&req)?;
    let file = state.files.update(&auth, id, req.into()).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// DELETE /api/files/{id} (moves to trash)
pub async fn delete_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> JsonResult<File> {
    let file = state.files.delete(&auth, id).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// PUT /api/files/{id}/content (raw body, `Content-Length` required)
pub async fn update_content(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Body,
) -> JsonResult<File> {
    let size = content_length(&headers)
        .ok_or_else(|| AppError::validation("Content-Length is required"))?;

    let content: ByteStream = Box::pin(body.into_data_stream().map_err(std::io::Error::other));
    let file = state.files.update_content(&auth, id, size, content).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// POST /api/files/{id}/restore
pub async fn restore_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> JsonResult<File> {
    let file = state.files.restore(&auth, id).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// DELETE /api/files/{id}/permanent
pub async fn permanent_delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.files.permanent_delete(&auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/files/{id}/copy
pub async fn copy_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    req: Option<Json<CopyFileRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<File>>)> {
    let parent_id = req.and_then(|Json(r)| r.parent_id);
    let copy = state.files.copy_file(&auth, id, parent_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(copy))))
}

/// GET /api/files/{id}/download
pub async fn download_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let (file, body) = state.files.download(&auth, id).await?;
    Ok(attachment_response(&file, body)?)
}

/// GET /api/files/{id}/versions
pub async fn list_versions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> JsonResult<Vec<FileVersion>> {
    let versions = state.files.list_versions(&auth, id).await?;
    Ok(Json(ApiResponse::ok(versions)))
}

/// POST /api/files/{id}/versions/{version}/restore
pub async fn restore_version(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, version)): Path<(Uuid, i32)>,
) -> JsonResult<File> {
    let file = state.files.restore_version(&auth, id, version).await?;
    Ok(Json(ApiResponse::ok(file)))
}

/// GET /api/trash
pub async fn list_trash(State(state): State<AppState>, auth: AuthUser) -> JsonResult<Vec<File>> {
    let files = state.files.list_trash(&auth).await?;
    Ok(Json(ApiResponse::ok(files)))
}

/// DELETE /api/trash
pub async fn empty_trash(
    State(state): State<AppState>,
    auth: AuthUser,
) -> JsonResult<EmptyTrashResponse> {
    let deleted = state.files.empty_trash(&auth).await?;
    Ok(Json(ApiResponse::ok(EmptyTrashResponse { deleted })))
}

/// GET /api/starred
pub async fn list_starred(State(state): State<AppState>, auth: AuthUser) -> JsonResult<Vec<File>> {
    let files = state.files.list_starred(&auth).await?;
    Ok(Json(ApiResponse::ok(files)))
}

/// GET /api/storage/stats
pub async fn storage_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> JsonResult<StorageStats> {
    let stats = state.files.storage_stats(&auth).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// A 200 response carrying the whole file as an attachment.
pub(crate) fn attachment_response(file: &File, body: ByteStream) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(file))
        .header(header::CONTENT_LENGTH, file.size)
        .header(header::CONTENT_DISPOSITION, content_disposition(&file.name))
        .body(Body::from_stream(body))
        .map_err(|e| AppError::internal(format!("Response build failed: {e}")))
}

pub(crate) fn content_type(file: &File) -> HeaderValue {
    HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

/// `attachment; filename="..."` with characters that would break the
/// header replaced.
pub(crate) fn content_disposition(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_escapes_quotes_and_non_ascii() {
        assert_eq!(
            content_disposition("report \"final\".pdf"),
            "attachment; filename=\"report _final_.pdf\""
        );
        assert_eq!(content_disposition("café.txt"), "attachment; filename=\"caf_.txt\"");
    }
}
