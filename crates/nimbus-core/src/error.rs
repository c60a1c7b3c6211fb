//! Unified application error types for Nimbus.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the `?` operator. The API layer turns the
//! [`ErrorKind`] into a status code; the message of server-side kinds is
//! never shown to callers.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The resource does not exist or is not owned by the caller.
    NotFound,
    /// Missing or invalid bearer credentials.
    Authentication,
    /// Input validation failed.
    Validation,
    /// A uniqueness constraint was violated.
    Conflict,
    /// The write would push the owner past their storage quota.
    QuotaExceeded,
    /// A public share has passed its expiry time.
    Expired,
    /// A public share has no downloads left.
    DownloadLimitReached,
    /// The share is password protected and no password was supplied.
    PasswordRequired,
    /// The supplied share password did not match.
    InvalidPassword,
    /// The caller is known but not allowed to perform the action.
    Forbidden,
    /// A byte range could not be satisfied against the resource length.
    RangeNotSatisfiable,
    /// An internal server error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A blob store I/O error occurred.
    Storage,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The requested operation is not implemented.
    NotImplemented,
}

impl ErrorKind {
    /// Whether this kind represents a server-side fault whose details must
    /// not be exposed to the caller.
    pub fn is_internal(self) -> bool {
        matches!(
            self,
            Self::Internal
                | Self::Database
                | Self::Storage
                | Self::Configuration
                | Self::Serialization
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "NOT_FOUND",
            Self::Authentication => "AUTHENTICATION",
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::Expired => "EXPIRED",
            Self::DownloadLimitReached => "DOWNLOAD_LIMIT_REACHED",
            Self::PasswordRequired => "PASSWORD_REQUIRED",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::Forbidden => "FORBIDDEN",
            Self::RangeNotSatisfiable => "RANGE_NOT_SATISFIABLE",
            Self::Internal => "INTERNAL",
            Self::Database => "DATABASE",
            Self::Storage => "STORAGE",
            Self::Configuration => "CONFIGURATION",
            Self::Serialization => "SERIALIZATION",
            Self::NotImplemented => "NOT_IMPLEMENTED",
        };
        f.write_str(name)
    }
}

/// The unified application error used throughout Nimbus.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a quota-exceeded error.
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QuotaExceeded, message)
    }

    /// Create an expired-share error.
    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expired, message)
    }

    /// Create a download-limit error.
    pub fn download_limit_reached(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DownloadLimitReached, message)
    }

    /// Create a password-required error.
    pub fn password_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PasswordRequired, message)
    }

    /// Create an invalid-password error.
    pub fn invalid_password(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPassword, message)
    }

    /// Create a forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// Create a range-not-satisfiable error.
    pub fn range_not_satisfiable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeNotSatisfiable, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a not-implemented error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = AppError::quota_exceeded("needs 10 more bytes");
        assert_eq!(err.to_string(), "QUOTA_EXCEEDED: needs 10 more bytes");
    }

    #[test]
    fn clone_drops_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = AppError::from(io);
        assert!(err.source.is_some());
        let cloned = err.clone();
        assert_eq!(cloned.kind, ErrorKind::Storage);
        assert!(cloned.source.is_none());
    }

    #[test]
    fn internal_kinds_are_flagged() {
        assert!(ErrorKind::Database.is_internal());
        assert!(ErrorKind::Storage.is_internal());
        assert!(!ErrorKind::QuotaExceeded.is_internal());
        assert!(!ErrorKind::NotFound.is_internal());
    }
}
