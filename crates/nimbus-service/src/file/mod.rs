//! File engine: tree operations, uploads, versions, downloads and streaming.
//!
//! [`FileEngine`] is one type whose methods are split by concern across
//! the submodules.

pub mod download;
pub mod service;
pub mod upload;
pub mod version;

pub use service::{FileEngine, FileUpdate};
pub use upload::StoredContent;
