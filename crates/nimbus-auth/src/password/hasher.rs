//! bcrypt password hashing and verification.

use nimbus_core::config::AuthConfig;
use nimbus_core::error::AppError;

/// Lowest and highest cost factors bcrypt accepts.
const COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Hashes and verifies share passwords using bcrypt.
///
/// The cost factor and salt are embedded in the modular crypt string, so
/// verification keeps working after the configured cost changes.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Creates a hasher with the cost factor from `config`.
    pub fn new(config: &AuthConfig) -> Result<Self, AppError> {
        if !COST_RANGE.contains(&config.bcrypt_cost) {
            return Err(AppError::configuration(format!(
                "bcrypt cost must be between 4 and 31, got {}",
                config.bcrypt_cost
            )));
        }
        Ok(Self {
            cost: config.bcrypt_cost,
        })
    }

    /// Hashes a plaintext password with a random salt.
    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
    }

    /// Verifies a plaintext password against a stored hash.
    ///
    /// Returns `Ok(true)` if the password matches, `Ok(false)` if not.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        bcrypt::verify(password, hash)
            .map_err(|e| AppError::internal(format!("Password verification failed: {e}")))
    }
}
