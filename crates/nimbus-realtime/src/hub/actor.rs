//! The hub control loop.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_core::events::RealtimeEvent;
use nimbus_core::result::AppResult;

use super::state::{Delivery, HubState};
use crate::connection::{ClientId, Frame};

/// Work submitted to the hub.
pub(crate) enum Command {
    Register {
        id: ClientId,
        user_id: Uuid,
        sender: mpsc::Sender<Frame>,
        done: oneshot::Sender<()>,
    },
    Unregister {
        id: ClientId,
    },
    Subscribe {
        id: ClientId,
        folder_id: Uuid,
        reply: oneshot::Sender<AppResult<()>>,
    },
    Unsubscribe {
        id: ClientId,
        folder_id: Uuid,
    },
    Publish(Box<RealtimeEvent>),
    SendToUser {
        user_id: Uuid,
        frame: Frame,
    },
    SendToFolder {
        folder_id: Uuid,
        frame: Frame,
    },
    Broadcast {
        frame: Frame,
    },
    Shutdown {
        done: oneshot::Sender<usize>,
    },
}

/// Why a client is being dropped.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Eviction {
    SlowConsumer,
    Gone,
}

pub(crate) struct HubActor {
    state: Arc<RwLock<HubState>>,
    commands: mpsc::Receiver<Command>,
    evict_tx: mpsc::UnboundedSender<(ClientId, Eviction)>,
    evict_rx: mpsc::UnboundedReceiver<(ClientId, Eviction)>,
    max_subscriptions: usize,
}

impl HubActor {
    pub fn new(
        state: Arc<RwLock<HubState>>,
        commands: mpsc::Receiver<Command>,
        max_subscriptions: usize,
    ) -> Self {
        let (evict_tx, evict_rx) = mpsc::unbounded_channel();
        Self {
            state,
            commands,
            evict_tx,
            evict_rx,
            max_subscriptions,
        }
    }

    /// Run until every hub handle is dropped or a shutdown is requested.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                Some((id, reason)) = self.evict_rx.recv() => self.evict(id, reason).await,
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { done }) => {
                        let closed = self.state.write().await.drain().len();
                        info!(clients = closed, "Realtime hub shut down");
                        let _ = done.send(closed);
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }
        debug!("Realtime hub loop exited");
    }

    async fn handle(&self, command: Command) {
        match command {
            Command::Register {
                id,
                user_id,
                sender,
                done,
            } => {
                self.state.write().await.insert(id, user_id, sender);
                debug!(client_id = %id, user_id = %user_id, "Realtime client registered");
                let _ = done.send(());
            }
            Command::Unregister { id } => {
                if self.state.write().await.remove(id).is_some() {
                    debug!(client_id = %id, "Realtime client unregistered");
                }
            }
            Command::Subscribe {
                id,
                folder_id,
                reply,
            } => {
                let result = match self
                    .state
                    .write()
                    .await
                    .subscribe(id, folder_id, self.max_subscriptions)
                {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(AppError::not_found("Client is not connected")),
                    Err(count) => Err(AppError::validation(format!(
                        "Maximum subscriptions ({count}) reached"
                    ))),
                };
                let _ = reply.send(result);
            }
            Command::Unsubscribe { id, folder_id } => {
                self.state.write().await.unsubscribe(id, folder_id);
            }
            Command::Publish(event) => self.publish(&event).await,
            Command::SendToUser { user_id, frame } => {
                let state = self.state.read().await;
                let failed = state.deliver(state.user_clients(&user_id), &frame);
                self.schedule(failed);
            }
            Command::SendToFolder { folder_id, frame } => {
                let state = self.state.read().await;
                let failed = state.deliver(state.folder_clients(&folder_id), &frame);
                self.schedule(failed);
            }
            Command::Broadcast { frame } => {
                let state = self.state.read().await;
                let failed = state.deliver(state.all_clients(), &frame);
                self.schedule(failed);
            }
            Command::Shutdown { .. } => {}
        }
    }

    async fn publish(&self, event: &RealtimeEvent) {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(event_type = %event.event_type, error = %e, "Failed to serialize realtime event");
                return;
            }
        };

        let state = self.state.read().await;
        let mut targets: Vec<ClientId> = Vec::new();
        for user in event.recipients() {
            targets.extend(state.user_clients(&user));
        }
        for folder in event.folders() {
            targets.extend(state.folder_clients(&folder));
        }
        let failed = state.deliver(&targets, &frame);
        self.schedule(failed);
    }

    /// Queue evictions for clients that could not take a frame. They are
    /// processed on a later turn of the loop.
    fn schedule(&self, failed: Vec<(ClientId, Delivery)>) {
        for (id, delivery) in failed {
            let reason = match delivery {
                Delivery::Full => Eviction::SlowConsumer,
                Delivery::Closed | Delivery::Queued => Eviction::Gone,
            };
            // The actor owns the receiver, so this cannot fail while it runs.
            let _ = self.evict_tx.send((id, reason));
        }
    }

    async fn evict(&self, id: ClientId, reason: Eviction) {
        let Some(entry) = self.state.write().await.remove(id) else {
            return;
        };
        match reason {
            Eviction::SlowConsumer => warn!(
                client_id = %id,
                user_id = %entry.user_id,
                "Evicted slow realtime client"
            ),
            Eviction::Gone => debug!(client_id = %id, "Dropped disconnected realtime client"),
        }
    }
}
