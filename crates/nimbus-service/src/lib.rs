//! # nimbus-service
//!
//! Business rules of Nimbus Drive. The engines orchestrate the metadata
//! repositories and the blob store and announce every committed change
//! through an [`EventPublisher`](nimbus_core::traits::EventPublisher).
//!
//! Engines follow constructor injection: all dependencies are handed in as
//! `Arc`s when the engine is built.

pub mod context;
pub mod file;
pub mod share;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::RequestContext;
pub use file::{FileEngine, FileUpdate, StoredContent};
pub use share::{
    CreatePublicShare, PublicDownload, PublicShareInfo, ShareEngine,
};
pub use stream::{ByteRange, RangeRequest, StreamBody, parse_range};
