//! Authentication configuration.

use serde::{Deserialize, Serialize};

/// Bearer token validation and stream token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC-SHA256 secret used by the identity service.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Expected `iss` claim; empty disables the check.
    #[serde(default)]
    pub jwt_issuer: String,
    /// Lifetime of stream tokens in seconds.
    #[serde(default = "default_stream_ttl")]
    pub stream_token_ttl_seconds: u64,
    /// bcrypt cost factor for share passwords (4 to 31).
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_issuer: String::new(),
            stream_token_ttl_seconds: default_stream_ttl(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_stream_ttl() -> u64 {
    300
}

fn default_bcrypt_cost() -> u32 {
    12
}
