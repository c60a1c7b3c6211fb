//! Route definitions for the Nimbus HTTP API.
//!
//! All routes are organized by domain and mounted under `/api`.

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{delete, get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_upload = usize::try_from(state.config.server.max_upload_size_bytes).unwrap_or(usize::MAX);
    let cors = build_cors_layer(&state.config.server.cors_origins);

    let api_routes = Router::new()
        .merge(file_routes())
        .merge(share_routes())
        .merge(public_routes())
        .merge(stream_routes())
        .route("/ws", get(handlers::ws::ws_upgrade))
        .route("/health", get(handlers::health::health));

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Files, folders, versions, trash and stats.
fn file_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/files",
            get(handlers::file::list_files).post(handlers::file::upload_file),
        )
        .route("/folders", post(handlers::file::create_folder))
        .route(
            "/files/{id}",
            get(handlers::file::get_file)
                .patch(handlers::file::update_file)
                .delete(handlers::file::delete_file),
        )
        .route("/files/{id}/content", put(handlers::file::update_content))
        .route("/files/{id}/restore", post(handlers::file::restore_file))
        .route("/files/{id}/permanent", delete(handlers::file::permanent_delete))
        .route("/files/{id}/copy", post(handlers::file::copy_file))
        .route("/files/{id}/download", get(handlers::file::download_file))
        .route("/files/{id}/versions", get(handlers::file::list_versions))
        .route(
            "/files/{id}/versions/{version}/restore",
            post(handlers::file::restore_version),
        )
        .route("/search", get(handlers::search::search_files))
        .route(
            "/trash",
            get(handlers::file::list_trash).delete(handlers::file::empty_trash),
        )
        .route("/starred", get(handlers::file::list_starred))
        .route("/storage/stats", get(handlers::file::storage_stats))
}

/// Share management by owners and grantees.
fn share_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/files/{id}/shares/public",
            post(handlers::share::create_public_share),
        )
        .route("/files/{id}/shares/user", post(handlers::share::share_with_user))
        .route("/shares", get(handlers::share::list_shares))
        .route("/shares/with-me", get(handlers::share::shared_with_me))
        .route("/shares/{id}", delete(handlers::share::revoke_share))
}

/// Unauthenticated public link access.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/public/shares/{token}", get(handlers::public::share_info))
        .route(
            "/public/shares/{token}/download",
            post(handlers::public::download),
        )
}

/// Range streaming.
fn stream_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/files/{id}/stream-token",
            post(handlers::stream::issue_stream_token),
        )
        .route("/files/{id}/stream", get(handlers::stream::stream_authenticated))
        .route("/stream/{id}", get(handlers::stream::stream_with_token))
}

/// CORS for the configured origins; `*` allows any.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::RANGE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_DISPOSITION,
        ])
        .max_age(Duration::from_secs(3600));

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}
