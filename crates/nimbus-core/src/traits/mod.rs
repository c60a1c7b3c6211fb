//! Capability traits implemented by other crates.

pub mod publisher;
pub mod storage;

pub use publisher::EventPublisher;
pub use storage::{BlobStore, ByteStream};
