//! JWT claim payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distinguishes session tokens from file-scoped stream tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Bearer token issued by the identity service.
    Access,
    /// Short-lived token granting read access to one file.
    Stream,
}

/// Claims of a bearer token issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID.
    pub sub: Uuid,
    /// Username, when the issuer includes it.
    #[serde(default)]
    pub username: String,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default)]
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Token type; absent on tokens from issuers that do not set it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
}

impl Claims {
    /// Returns the user ID from the subject claim.
    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Username, falling back to the user ID when the issuer omitted it.
    pub fn display_name(&self) -> String {
        if self.username.is_empty() {
            self.sub.to_string()
        } else {
            self.username.clone()
        }
    }
}

/// Claims of a stream token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamClaims {
    /// The user the token was issued to.
    pub sub: Uuid,
    /// The only file this token may read.
    pub fid: Uuid,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Always [`TokenType::Stream`].
    pub token_type: TokenType,
}

impl StreamClaims {
    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}
