//! Maps domain `AppError` to HTTP responses.
//!
//! Handlers return [`ApiResult`]; `?` lifts any `AppError` into
//! [`ApiError`], which owns the `IntoResponse` impl.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use nimbus_core::error::{AppError, ErrorKind};

/// Body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error kind, e.g. `QUOTA_EXCEEDED`.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authentication | ErrorKind::PasswordRequired => StatusCode::UNAUTHORIZED,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::QuotaExceeded => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::Expired | ErrorKind::DownloadLimitReached => StatusCode::GONE,
        ErrorKind::InvalidPassword | ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
        ErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::Internal
        | ErrorKind::Database
        | ErrorKind::Storage
        | ErrorKind::Configuration
        | ErrorKind::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// HTTP-facing wrapper around a domain error.
#[derive(Debug)]
pub struct ApiError(pub AppError);

/// Result type returned by handlers and extractors.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(err.kind);

        let (error, message) = if err.kind.is_internal() {
            tracing::error!(
                kind = %err.kind,
                error = %err.message,
                source = ?err.source,
                "Internal server error"
            );
            ("INTERNAL".to_string(), "internal server error".to_string())
        } else {
            (err.kind.to_string(), err.message)
        };

        (status, Json(ApiErrorResponse { error, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> ApiErrorResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let response = ApiError::from(AppError::quota_exceeded("needs 10 more bytes")).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = body_of(response).await;
        assert_eq!(body.error, "QUOTA_EXCEEDED");
        assert_eq!(body.message, "needs 10 more bytes");
    }

    #[tokio::test]
    async fn internal_errors_are_redacted() {
        let response = ApiError::from(AppError::database("relation \"files\" does not exist")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert_eq!(body.error, "INTERNAL");
        assert_eq!(body.message, "internal server error");
    }

    #[tokio::test]
    async fn question_mark_lifts_app_errors() {
        fn lookup() -> ApiResult<()> {
            Err(AppError::not_found("File not found"))?;
            Ok(())
        }

        let response = lookup().unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await.error, "NOT_FOUND");
    }

    #[test]
    fn share_errors_map_to_distinct_statuses() {
        assert_eq!(status_for(ErrorKind::Expired), StatusCode::GONE);
        assert_eq!(status_for(ErrorKind::DownloadLimitReached), StatusCode::GONE);
        assert_eq!(status_for(ErrorKind::PasswordRequired), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::InvalidPassword), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::NotImplemented), StatusCode::NOT_IMPLEMENTED);
    }
}
