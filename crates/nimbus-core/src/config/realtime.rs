//! Realtime hub configuration.

use serde::{Deserialize, Serialize};

/// Realtime (WebSocket) hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each client's outbound queue. A full queue evicts the client.
    #[serde(default = "default_client_queue")]
    pub client_queue_capacity: usize,
    /// Capacity of the hub's command channel.
    #[serde(default = "default_command_buffer")]
    pub command_buffer_size: usize,
    /// WebSocket ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Seconds of silence after which a client is closed.
    #[serde(default = "default_client_timeout")]
    pub client_timeout_seconds: u64,
    /// Maximum folder subscriptions per connection.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions_per_connection: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            client_queue_capacity: default_client_queue(),
            command_buffer_size: default_command_buffer(),
            ping_interval_seconds: default_ping_interval(),
            client_timeout_seconds: default_client_timeout(),
            max_subscriptions_per_connection: default_max_subscriptions(),
        }
    }
}

fn default_client_queue() -> usize {
    256
}

fn default_command_buffer() -> usize {
    1024
}

fn default_ping_interval() -> u64 {
    30
}

fn default_client_timeout() -> u64 {
    90
}

fn default_max_subscriptions() -> usize {
    50
}
