//! # nimbus-api
//!
//! HTTP API layer for Nimbus Drive built on Axum.
//!
//! Provides the REST endpoints under `/api`, the WebSocket upgrade, bearer
//! and stream token extraction, DTOs and [`error::ApiError`], which maps
//! [`AppError`](nimbus_core::AppError) to HTTP responses.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
