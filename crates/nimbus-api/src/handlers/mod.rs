//! Route handlers organized by domain.

pub mod file;
pub mod health;
pub mod public;
pub mod search;
pub mod share;
pub mod stream;
pub mod ws;
