//! # nimbus-realtime
//!
//! Realtime hub for Nimbus Drive. A single actor task owns every
//! subscription map; WebSocket handlers and the engines talk to it through
//! channels. Each client has a bounded outbound queue and is evicted when
//! it cannot keep up.

pub mod connection;
pub mod hub;
pub mod message;

pub use connection::{ClientConnection, ClientId, Frame};
pub use hub::RealtimeHub;
pub use message::{ClientMessage, ServerMessage};
