//! Client and server WebSocket message definitions.
//!
//! Change events are sent as the serialized
//! [`RealtimeEvent`](nimbus_core::events::RealtimeEvent) itself; the
//! variants here cover the control frames.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;

use crate::connection::Frame;

/// Messages sent by the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Receive events for a folder.
    Subscribe {
        /// Folder to follow.
        folder_id: Uuid,
    },
    /// Stop receiving events for a folder.
    Unsubscribe {
        /// Folder to drop.
        folder_id: Uuid,
    },
    /// Application-level keepalive.
    Ping,
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::validation(format!("Invalid message: {e}")))
    }
}

/// Control messages sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Reply to a client ping.
    Pong,
    /// A folder subscription was accepted.
    Subscribed { folder_id: Uuid },
    /// A folder subscription was dropped.
    Unsubscribed { folder_id: Uuid },
    /// A request could not be served.
    Error { message: String },
}

impl ServerMessage {
    /// Build an error frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize into a queueable frame.
    pub fn to_frame(&self) -> AppResult<Frame> {
        Ok(serde_json::to_string(self)?.into())
    }
}
