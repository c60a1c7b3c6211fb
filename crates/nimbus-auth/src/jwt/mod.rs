//! JWT validation and stream token issuance.

pub mod claims;
pub mod decoder;
pub mod encoder;

pub use claims::{Claims, StreamClaims, TokenType};
pub use decoder::JwtDecoder;
pub use encoder::JwtEncoder;
