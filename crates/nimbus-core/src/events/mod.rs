//! Change events fanned out to realtime clients.
//!
//! Every event serializes as
//! `{"type": "file:created", "payload": {..}, "folder_id": .., "user_id": .., "timestamp": ..}`.
//! `folder_id` is omitted for events that do not concern a folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "file:created")]
    FileCreated,
    #[serde(rename = "file:updated")]
    FileUpdated,
    #[serde(rename = "file:deleted")]
    FileDeleted,
    #[serde(rename = "file:moved")]
    FileMoved,
    #[serde(rename = "file:restored")]
    FileRestored,
    #[serde(rename = "share:created")]
    ShareCreated,
    #[serde(rename = "share:revoked")]
    ShareRevoked,
}

impl EventType {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileCreated => "file:created",
            Self::FileUpdated => "file:updated",
            Self::FileDeleted => "file:deleted",
            Self::FileMoved => "file:moved",
            Self::FileRestored => "file:restored",
            Self::ShareCreated => "share:created",
            Self::ShareRevoked => "share:revoked",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change event with its routing information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Event body, usually the affected record.
    pub payload: serde_json::Value,
    /// Folder the change happened in; `None` for the root or share events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Uuid>,
    /// User that owns the affected resource.
    pub user_id: Uuid,
    /// When the change was committed.
    pub timestamp: DateTime<Utc>,
    /// Further users to notify besides `user_id`.
    #[serde(skip)]
    pub also_notify: Vec<Uuid>,
    /// Further folder channels besides `folder_id`.
    #[serde(skip)]
    pub also_folders: Vec<Uuid>,
}

impl RealtimeEvent {
    /// Create an event stamped with the current time.
    pub fn new(
        event_type: EventType,
        user_id: Uuid,
        folder_id: Option<Uuid>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            payload,
            folder_id,
            user_id,
            timestamp: Utc::now(),
            also_notify: Vec::new(),
            also_folders: Vec::new(),
        }
    }

    /// Add a recipient besides the owning user.
    pub fn notify(mut self, user_id: Uuid) -> Self {
        if user_id != self.user_id && !self.also_notify.contains(&user_id) {
            self.also_notify.push(user_id);
        }
        self
    }

    /// Also deliver to subscribers of `folder_id` (no-op for the root).
    pub fn also_in_folder(mut self, folder_id: Option<Uuid>) -> Self {
        if let Some(folder) = folder_id {
            if self.folder_id != Some(folder) && !self.also_folders.contains(&folder) {
                self.also_folders.push(folder);
            }
        }
        self
    }

    /// All folder channels this event is delivered to.
    pub fn folders(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.folder_id.into_iter().chain(self.also_folders.iter().copied())
    }

    /// All users that should receive this event on their user channel.
    pub fn recipients(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.user_id).chain(self.also_notify.iter().copied())
    }
}
