//! JWT validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use nimbus_core::config::AuthConfig;
use nimbus_core::error::AppError;

use super::claims::{Claims, StreamClaims, TokenType};

/// Validates HS256 bearer and stream tokens.
#[derive(Clone)]
pub struct JwtDecoder {
    decoding_key: DecodingKey,
    /// Access tokens: signature, expiry and issuer when configured.
    access_validation: Validation,
    /// Stream tokens are minted locally and carry no issuer.
    stream_validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("access_validation", &self.access_validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut stream_validation = Validation::new(Algorithm::HS256);
        stream_validation.validate_exp = true;
        stream_validation.leeway = 5;

        let mut access_validation = stream_validation.clone();
        if !config.jwt_issuer.is_empty() {
            access_validation.set_issuer(&[config.jwt_issuer.as_str()]);
            // A token without `iss` would otherwise pass the issuer check.
            access_validation.set_required_spec_claims(&["exp", "iss"]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_validation,
            stream_validation,
        }
    }

    /// Decodes and validates a bearer token.
    pub fn decode_access_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims: Claims = self.decode_token(token, &self.access_validation)?;
        if claims.token_type == Some(TokenType::Stream) {
            return Err(AppError::authentication(
                "Invalid token type: expected access token",
            ));
        }
        Ok(claims)
    }

    /// Decodes a stream token and checks it was issued for `file_id`.
    pub fn decode_stream_token(&self, token: &str, file_id: Uuid) -> Result<StreamClaims, AppError> {
        let claims: StreamClaims = self.decode_token(token, &self.stream_validation)?;
        if claims.token_type != TokenType::Stream {
            return Err(AppError::authentication(
                "Invalid token type: expected stream token",
            ));
        }
        if claims.fid != file_id {
            return Err(AppError::authentication("Stream token is not valid for this file"));
        }
        Ok(claims)
    }

    fn decode_token<T: DeserializeOwned>(
        &self,
        token: &str,
        validation: &Validation,
    ) -> Result<T, AppError> {
        let token_data = decode::<T>(token, &self.decoding_key, validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::authentication("Token has expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    AppError::authentication("Invalid token format")
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::authentication("Invalid token signature")
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AppError::authentication("Invalid token issuer")
                }
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                    AppError::authentication(format!("Token is missing the {claim} claim"))
                }
                _ => AppError::authentication(format!("Token validation failed: {e}")),
            }
        })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtEncoder;
    use chrono::Duration;
    use nimbus_core::ErrorKind;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".into(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let user = Uuid::new_v4();
        let token = JwtEncoder::new(&config())
            .access_token(user, "alice", Duration::minutes(5))
            .unwrap();
        let claims = JwtDecoder::new(&config()).decode_access_token(&token).unwrap();
        assert_eq!(claims.user_id(), user);
        assert_eq!(claims.display_name(), "alice");
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let token = JwtEncoder::new(&config())
            .access_token(Uuid::new_v4(), "bob", Duration::minutes(-10))
            .unwrap();
        let err = JwtDecoder::new(&config())
            .decode_access_token(&token)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtEncoder::new(&config())
            .access_token(Uuid::new_v4(), "eve", Duration::minutes(5))
            .unwrap();
        let other = AuthConfig {
            jwt_secret: "other".into(),
            ..AuthConfig::default()
        };
        assert!(JwtDecoder::new(&other).decode_access_token(&token).is_err());
    }

    #[test]
    fn stream_token_is_scoped_to_one_file() {
        let encoder = JwtEncoder::new(&config());
        let decoder = JwtDecoder::new(&config());
        let (file_a, file_b) = (Uuid::new_v4(), Uuid::new_v4());
        let (token, _) = encoder.stream_token(Uuid::new_v4(), file_a).unwrap();

        assert_eq!(decoder.decode_stream_token(&token, file_a).unwrap().fid, file_a);
        let err = decoder.decode_stream_token(&token, file_b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn stream_token_is_not_a_bearer_token() {
        let (token, _) = JwtEncoder::new(&config())
            .stream_token(Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        assert!(JwtDecoder::new(&config()).decode_access_token(&token).is_err());
    }

    #[test]
    fn access_token_is_not_a_stream_token() {
        let token = JwtEncoder::new(&config())
            .access_token(Uuid::new_v4(), "alice", Duration::minutes(5))
            .unwrap();
        let err = JwtDecoder::new(&config())
            .decode_stream_token(&token, Uuid::new_v4())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn issuer_is_checked_when_configured() {
        let issuing = AuthConfig {
            jwt_issuer: "identity".into(),
            ..config()
        };
        let token = JwtEncoder::new(&config())
            .access_token(Uuid::new_v4(), "alice", Duration::minutes(5))
            .unwrap();
        // Token carries no issuer, decoder requires one.
        let err = JwtDecoder::new(&issuing).decode_access_token(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert!(err.message.contains("iss"));

        let foreign = AuthConfig {
            jwt_issuer: "somebody-else".into(),
            ..config()
        };
        let token = JwtEncoder::new(&foreign)
            .access_token(Uuid::new_v4(), "alice", Duration::minutes(5))
            .unwrap();
        let err = JwtDecoder::new(&issuing).decode_access_token(&token).unwrap_err();
        assert_eq!(err.message, "Invalid token issuer");

        let token = JwtEncoder::new(&issuing)
            .access_token(Uuid::new_v4(), "alice", Duration::minutes(5))
            .unwrap();
        assert!(JwtDecoder::new(&issuing).decode_access_token(&token).is_ok());
    }
}
