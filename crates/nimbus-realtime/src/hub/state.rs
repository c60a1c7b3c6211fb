//! Subscription maps owned by the hub actor.
//!
//! Only the actor mutates this state; read queries go through the shared
//! `RwLock` around it. Folder membership is kept on both sides: each client
//! record lists its folders and `folders` lists each folder's clients.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::connection::{ClientId, Frame};

/// Outcome of queueing a frame for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Queued,
    /// The client's queue is full.
    Full,
    /// The client dropped its receiver.
    Closed,
}

#[derive(Debug)]
pub(crate) struct ClientEntry {
    pub user_id: Uuid,
    sender: mpsc::Sender<Frame>,
    pub folders: HashSet<Uuid>,
}

impl ClientEntry {
    fn deliver(&self, frame: &Frame) -> Delivery {
        match self.sender.try_send(frame.clone()) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct HubState {
    clients: HashMap<ClientId, ClientEntry>,
    users: HashMap<Uuid, HashSet<ClientId>>,
    folders: HashMap<Uuid, HashSet<ClientId>>,
}

impl HubState {
    pub fn insert(&mut self, id: ClientId, user_id: Uuid, sender: mpsc::Sender<Frame>) {
        self.clients.insert(
            id,
            ClientEntry {
                user_id,
                sender,
                folders: HashSet::new(),
            },
        );
        self.users.entry(user_id).or_default().insert(id);
    }

    /// Drop a client from every map. Dropping its sender closes its queue.
    pub fn remove(&mut self, id: ClientId) -> Option<ClientEntry> {
        let entry = self.clients.remove(&id)?;

        if let Some(ids) = self.users.get_mut(&entry.user_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.users.remove(&entry.user_id);
            }
        }
        for folder in &entry.folders {
            self.leave(*folder, id);
        }
        Some(entry)
    }

    /// Add a folder subscription. Returns `Err(count)` when the client is
    /// already at `max` folders, `Ok(false)` for an unknown client.
    pub fn subscribe(&mut self, id: ClientId, folder: Uuid, max: usize) -> Result<bool, usize> {
        let Some(entry) = self.clients.get_mut(&id) else {
            return Ok(false);
        };
        if !entry.folders.contains(&folder) && entry.folders.len() >= max {
            return Err(entry.folders.len());
        }
        entry.folders.insert(folder);
        self.folders.entry(folder).or_default().insert(id);
        Ok(true)
    }

    pub fn unsubscribe(&mut self, id: ClientId, folder: Uuid) -> bool {
        let Some(entry) = self.clients.get_mut(&id) else {
            return false;
        };
        let removed = entry.folders.remove(&folder);
        self.leave(folder, id);
        removed
    }

    fn leave(&mut self, folder: Uuid, id: ClientId) {
        if let Some(ids) = self.folders.get_mut(&folder) {
            ids.remove(&id);
            if ids.is_empty() {
                self.folders.remove(&folder);
            }
        }
    }

    /// Queue `frame` for each client once, reporting clients that could
    /// not take it.
    pub fn deliver<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a ClientId>,
        frame: &Frame,
    ) -> Vec<(ClientId, Delivery)> {
        let mut seen = HashSet::new();
        let mut failed = Vec::new();
        for id in targets {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(entry) = self.clients.get(id) {
                let outcome = entry.deliver(frame);
                if outcome != Delivery::Queued {
                    failed.push((*id, outcome));
                }
            }
        }
        failed
    }

    pub fn user_clients(&self, user_id: &Uuid) -> impl Iterator<Item = &ClientId> {
        self.users.get(user_id).into_iter().flatten()
    }

    pub fn folder_clients(&self, folder: &Uuid) -> impl Iterator<Item = &ClientId> {
        self.folders.get(folder).into_iter().flatten()
    }

    pub fn all_clients(&self) -> impl Iterator<Item = &ClientId> {
        self.clients.keys()
    }

    pub fn drain(&mut self) -> Vec<ClientId> {
        let ids: Vec<_> = self.clients.keys().copied().collect();
        for id in &ids {
            self.remove(*id);
        }
        ids
    }

    pub fn is_user_online(&self, user_id: &Uuid) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    pub fn folder_subscriber_count(&self, folder: &Uuid) -> usize {
        self.folders.get(folder).map_or(0, HashSet::len)
    }
}
