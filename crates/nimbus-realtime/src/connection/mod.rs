//! Client connection handles.

pub mod handle;

pub use handle::{ClientConnection, ClientId, Frame};
