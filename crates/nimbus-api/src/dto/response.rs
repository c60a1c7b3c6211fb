//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// A freshly issued stream token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Ready-made URL for media elements.
    pub url: String,
}

/// Result of emptying the trash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmptyTrashResponse {
    /// Top-level items removed.
    pub deleted: usize,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub storage: String,
    pub ws_connections: usize,
}
