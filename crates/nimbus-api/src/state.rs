//! Application state shared across all handlers.

use std::sync::Arc;

use dashmap::DashSet;
use uuid::Uuid;

use nimbus_auth::{JwtDecoder, JwtEncoder, PasswordHasher};
use nimbus_core::config::AppConfig;
use nimbus_core::result::AppResult;
use nimbus_core::traits::{BlobStore, EventPublisher};
use nimbus_database::Database;
use nimbus_realtime::RealtimeHub;
use nimbus_service::{FileEngine, ShareEngine};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`. Every field is
/// cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata repositories.
    pub db: Database,
    /// Files, folders, trash and versions.
    pub files: FileEngine,
    /// User grants and public links.
    pub shares: ShareEngine,
    /// Realtime fan-out.
    pub hub: RealtimeHub,
    pub jwt_decoder: Arc<JwtDecoder>,
    pub jwt_encoder: Arc<JwtEncoder>,
    /// Users whose row is known to exist, so `ensure` runs once per
    /// user and process.
    pub known_users: Arc<DashSet<Uuid>>,
}

impl AppState {
    /// Wire the engines over the given backends.
    pub fn new(
        config: AppConfig,
        db: Database,
        blobs: Arc<dyn BlobStore>,
        hub: RealtimeHub,
    ) -> AppResult<Self> {
        let publisher: Arc<dyn EventPublisher> = Arc::new(hub.clone());
        let hasher = Arc::new(PasswordHasher::new(&config.auth)?);

        let files = FileEngine::new(&db, blobs.clone(), publisher.clone());
        let shares = ShareEngine::new(
            &db,
            blobs,
            hasher,
            publisher,
            config.sharing.clone(),
        );

        Ok(Self {
            jwt_decoder: Arc::new(JwtDecoder::new(&config.auth)),
            jwt_encoder: Arc::new(JwtEncoder::new(&config.auth)),
            config: Arc::new(config),
            db,
            files,
            shares,
            hub,
            known_users: Arc::new(DashSet::new()),
        })
    }
}
