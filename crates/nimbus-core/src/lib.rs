//! # nimbus-core
//!
//! Core crate for Nimbus Drive. Contains the unified error system,
//! configuration schemas, realtime event definitions and the capability
//! traits (blob store, event publisher) that the other crates plug into.
//!
//! This crate has **no** internal dependencies on other Nimbus crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
