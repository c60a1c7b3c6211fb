//! Sharing engine: user grants and public links.

pub mod access;
pub mod link;
pub mod service;

pub use access::{PublicDownload, PublicShareInfo};
pub use link::generate_token;
pub use service::{CreatePublicShare, ShareEngine};
