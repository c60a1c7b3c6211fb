//! Public share configuration.

use serde::{Deserialize, Serialize};

/// Settings for public share links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Random bytes per share token before base64url encoding.
    #[serde(default = "default_token_bytes")]
    pub token_bytes: usize,
    /// Upper bound for `expires_in_days` on new public shares.
    #[serde(default = "default_max_expiry_days")]
    pub max_expiry_days: i64,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            token_bytes: default_token_bytes(),
            max_expiry_days: default_max_expiry_days(),
        }
    }
}

fn default_token_bytes() -> usize {
    16
}

fn default_max_expiry_days() -> i64 {
    365
}
