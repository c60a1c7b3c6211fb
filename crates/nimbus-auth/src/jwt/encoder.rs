//! JWT creation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use nimbus_core::config::AuthConfig;
use nimbus_core::error::AppError;

use super::claims::{Claims, StreamClaims, TokenType};

/// Signs HS256 tokens with the shared secret.
///
/// In production only stream tokens are minted here; access tokens come
/// from the identity service; [`JwtEncoder::access_token`] exists for
/// tooling and tests that need a valid bearer token.
#[derive(Clone)]
pub struct JwtEncoder {
    encoding_key: EncodingKey,
    issuer: Option<String>,
    stream_ttl: Duration,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder")
            .field("issuer", &self.issuer)
            .field("stream_ttl", &self.stream_ttl)
            .finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let ttl_seconds = i64::try_from(config.stream_token_ttl_seconds).unwrap_or(i64::MAX);
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: (!config.jwt_issuer.is_empty()).then(|| config.jwt_issuer.clone()),
            stream_ttl: Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        }
    }

    /// Issues a stream token letting `user_id` read `file_id`.
    pub fn stream_token(
        &self,
        user_id: Uuid,
        file_id: Uuid,
    ) -> Result<(String, DateTime<Utc>), AppError> {
        let now = Utc::now();
        let exp = now + self.stream_ttl;
        let claims = StreamClaims {
            sub: user_id,
            fid: file_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            token_type: TokenType::Stream,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode stream token: {e}")))?;
        Ok((token, exp))
    }

    /// Issues an access token for `user_id` valid for `ttl`.
    pub fn access_token(
        &self,
        user_id: Uuid,
        username: &str,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
            token_type: Some(TokenType::Access),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode access token: {e}")))
    }
}
