//! # nimbus-database
//!
//! Metadata repository for Nimbus Drive. The repository capabilities are
//! traits in [`traits`]; [`repositories`] implements them on PostgreSQL and
//! [`memory`] implements them in-process with the same semantics. The
//! [`Database`] handle picks one from configuration.

pub mod database;
pub mod memory;
pub mod repositories;
pub mod traits;

pub use database::Database;
pub use traits::{FileRepository, ShareRepository, UserRepository, VersionRepository};
