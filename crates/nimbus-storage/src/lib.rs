//! # nimbus-storage
//!
//! Blob store backends for Nimbus Drive plus the helpers the engines use
//! around them: storage key generation, MIME detection and a hashing
//! stream adapter.

pub mod factory;
pub mod hashing;
pub mod keys;
pub mod providers;

pub use factory::build_blob_store;
pub use hashing::{DigestHandle, HashingStream};
pub use keys::{generate_storage_key, mime_from_name};
pub use providers::{LocalBlobStore, MemoryBlobStore};
