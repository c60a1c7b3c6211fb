//! # nimbus-entity
//!
//! Domain entity models for Nimbus Drive. Row structs derive
//! `sqlx::FromRow`; everything derives `Serialize`/`Deserialize` so the
//! API layer can return entities directly.

pub mod file;
pub mod share;
pub mod storage;
pub mod user;
