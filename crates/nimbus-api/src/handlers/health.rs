//! Health check handler.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::dto::ApiResponse;
use crate::dto::response::HealthResponse;
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let database = match state.db.health_check().await {
        Ok(true) => "connected",
        Ok(false) => "unavailable",
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            "unavailable"
        }
    };
    let status = if database == "connected" { "ok" } else { "degraded" };

    Json(ApiResponse::ok(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        storage: state.files.storage_provider().to_string(),
        ws_connections: state.hub.connection_count().await,
    }))
}
