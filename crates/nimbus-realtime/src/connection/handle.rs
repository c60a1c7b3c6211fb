//! The receiving side of one registered client.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique client identifier. Every (re)connect gets a fresh one.
pub type ClientId = Uuid;

/// A serialized text frame queued for a client.
///
/// Frames are shared between all recipients of one broadcast.
pub type Frame = Arc<str>;

/// A registered client as seen by its WebSocket handler.
///
/// The hub keeps the sending half. When the hub drops it (unregister,
/// eviction or shutdown) `recv` returns `None` and the handler should close
/// the socket.
#[derive(Debug)]
pub struct ClientConnection {
    /// Client identity.
    pub id: ClientId,
    /// Authenticated user.
    pub user_id: Uuid,
    /// When the client was registered.
    pub connected_at: DateTime<Utc>,
    receiver: mpsc::Receiver<Frame>,
}

impl ClientConnection {
    pub(crate) fn new(id: ClientId, user_id: Uuid, receiver: mpsc::Receiver<Frame>) -> Self {
        Self {
            id,
            user_id,
            connected_at: Utc::now(),
            receiver,
        }
    }

    /// Wait for the next outbound frame.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Take a queued frame without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}
