//! The realtime hub handle.
//!
//! [`RealtimeHub`] is a cheap, cloneable handle to a single actor task that
//! owns the client registry and folder subscriptions. Writers submit
//! commands over a bounded channel; the actor delivers frames with
//! `try_send` so a slow client can never stall fan-out. A client whose
//! queue is full is evicted through a separate unbounded channel that the
//! actor drains before taking new commands.

mod actor;
mod state;

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use nimbus_core::config::RealtimeConfig;
use nimbus_core::error::AppError;
use nimbus_core::events::RealtimeEvent;
use nimbus_core::result::AppResult;
use nimbus_core::traits::EventPublisher;

use self::actor::{Command, HubActor};
use self::state::HubState;
use crate::connection::{ClientConnection, ClientId};
use crate::message::ServerMessage;

/// Handle to the realtime hub.
#[derive(Clone)]
pub struct RealtimeHub {
    commands: mpsc::Sender<Command>,
    state: Arc<RwLock<HubState>>,
    client_queue_capacity: usize,
}

impl std::fmt::Debug for RealtimeHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeHub")
            .field("client_queue_capacity", &self.client_queue_capacity)
            .finish()
    }
}

impl RealtimeHub {
    /// Start the hub actor on the current runtime.
    ///
    /// The actor stops once every handle has been dropped or
    /// [`shutdown`](Self::shutdown) is called.
    pub fn spawn(config: &RealtimeConfig) -> Self {
        let (commands, rx) = mpsc::channel(config.command_buffer_size.max(1));
        let state = Arc::new(RwLock::new(HubState::default()));

        let actor = HubActor::new(state.clone(), rx, config.max_subscriptions_per_connection);
        tokio::spawn(actor.run());

        info!(
            client_queue_capacity = config.client_queue_capacity,
            max_subscriptions = config.max_subscriptions_per_connection,
            "Realtime hub started"
        );

        Self {
            commands,
            state,
            client_queue_capacity: config.client_queue_capacity.max(1),
        }
    }

    /// Register a client for `user_id` and return its receiving side.
    pub async fn register(&self, user_id: Uuid) -> AppResult<ClientConnection> {
        let id = Uuid::now_v7();
        let (sender, receiver) = mpsc::channel(self.client_queue_capacity);
        let (done, registered) = oneshot::channel();

        self.submit(Command::Register {
            id,
            user_id,
            sender,
            done,
        })
        .await?;
        registered.await.map_err(|_| stopped())?;

        Ok(ClientConnection::new(id, user_id, receiver))
    }

    /// Remove a client. Unknown ids are ignored.
    pub async fn unregister(&self, id: ClientId) {
        if self.submit(Command::Unregister { id }).await.is_err() {
            debug!(client_id = %id, "Realtime hub already stopped");
        }
    }

    /// Subscribe a client to a folder's events.
    ///
    /// Ownership of the folder is checked by the caller.
    pub async fn subscribe(&self, id: ClientId, folder_id: Uuid) -> AppResult<()> {
        let (reply, result) = oneshot::channel();
        self.submit(Command::Subscribe {
            id,
            folder_id,
            reply,
        })
        .await?;
        result.await.map_err(|_| stopped())?
    }

    /// Drop a folder subscription.
    pub async fn unsubscribe(&self, id: ClientId, folder_id: Uuid) -> AppResult<()> {
        self.submit(Command::Unsubscribe { id, folder_id }).await
    }

    /// Send a control message to every client of a user.
    pub async fn send_to_user(&self, user_id: Uuid, message: &ServerMessage) -> AppResult<()> {
        let frame = message.to_frame()?;
        self.submit(Command::SendToUser { user_id, frame }).await
    }

    /// Send a control message to every subscriber of a folder.
    pub async fn send_to_folder(&self, folder_id: Uuid, message: &ServerMessage) -> AppResult<()> {
        let frame = message.to_frame()?;
        self.submit(Command::SendToFolder { folder_id, frame }).await
    }

    /// Send a control message to every connected client.
    pub async fn broadcast(&self, message: &ServerMessage) -> AppResult<()> {
        let frame = message.to_frame()?;
        self.submit(Command::Broadcast { frame }).await
    }

    /// Close every client and stop the actor. Returns the number of
    /// clients that were connected.
    pub async fn shutdown(&self) -> usize {
        let (done, closed) = oneshot::channel();
        if self.submit(Command::Shutdown { done }).await.is_err() {
            return 0;
        }
        closed.await.unwrap_or(0)
    }

    /// Whether the user has at least one connected client.
    pub async fn is_user_online(&self, user_id: Uuid) -> bool {
        self.state.read().await.is_user_online(&user_id)
    }

    /// Number of connected clients.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connection_count()
    }

    /// Number of clients subscribed to a folder.
    pub async fn folder_subscriber_count(&self, folder_id: Uuid) -> usize {
        self.state.read().await.folder_subscriber_count(&folder_id)
    }

    async fn submit(&self, command: Command) -> AppResult<()> {
        self.commands.send(command).await.map_err(|_| stopped())
    }
}

impl EventPublisher for RealtimeHub {
    fn publish(&self, event: RealtimeEvent) {
        let event_type = event.event_type;
        match self.commands.try_send(Command::Publish(Box::new(event))) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(event_type = %event_type, "Realtime hub is saturated, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(event_type = %event_type, "Realtime hub stopped, dropping event");
            }
        }
    }
}

fn stopped() -> AppError {
    AppError::internal("Realtime hub is not running")
}
