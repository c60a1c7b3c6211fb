//! # nimbus-auth
//!
//! Credential handling for Nimbus Drive.
//!
//! ## Modules
//!
//! - `jwt`: validation of bearer tokens issued by the identity service and
//!   short-lived stream tokens scoped to a single file
//! - `password`: bcrypt hashing of public share passwords

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtDecoder, JwtEncoder, StreamClaims, TokenType};
pub use password::PasswordHasher;
