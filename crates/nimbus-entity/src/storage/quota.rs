//! Storage quota value objects.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Quota state of one user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageQuota {
    /// Limit in bytes; 0 means unlimited.
    pub limit_bytes: i64,
    /// Currently used bytes.
    pub used_bytes: i64,
}

impl StorageQuota {
    /// Create a quota from limit and used values.
    pub fn new(limit_bytes: i64, used_bytes: i64) -> Self {
        Self {
            limit_bytes,
            used_bytes,
        }
    }

    /// Whether a limit is configured.
    pub fn is_limited(&self) -> bool {
        self.limit_bytes > 0
    }

    /// Check if adding the given number of bytes would exceed the quota.
    pub fn would_exceed(&self, additional_bytes: i64) -> bool {
        self.is_limited() && self.used_bytes.saturating_add(additional_bytes) > self.limit_bytes
    }

    /// Bytes still available, `None` when unlimited.
    pub fn available_bytes(&self) -> Option<i64> {
        self.is_limited()
            .then(|| (self.limit_bytes - self.used_bytes).max(0))
    }

    /// Usage percentage; 0 when unlimited.
    pub fn used_pct(&self) -> f64 {
        if self.is_limited() {
            (self.used_bytes as f64 / self.limit_bytes as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Bytes and file count per MIME type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MimeUsage {
    pub mime_type: String,
    pub bytes: i64,
    pub count: i64,
}

/// Aggregated storage usage of one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageStats {
    /// Bytes accounted to the user.
    pub used_bytes: i64,
    /// Quota limit; 0 means unlimited.
    pub quota_limit: i64,
    /// `used / limit * 100` when limited, otherwise 0.
    pub used_pct: f64,
    /// Number of non-folder rows, trashed included.
    pub file_count: i64,
    /// Breakdown by MIME type, largest first.
    pub by_mime_type: Vec<MimeUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: i64 = 1024 * 1024;

    #[test]
    fn would_exceed_respects_limit() {
        let quota = StorageQuota::new(100 * MB, 95 * MB);
        assert!(quota.would_exceed(10 * MB));
        assert!(!quota.would_exceed(5 * MB));
        assert_eq!(quota.available_bytes(), Some(5 * MB));
    }

    #[test]
    fn zero_limit_is_unlimited() {
        let quota = StorageQuota::new(0, i64::MAX - 1);
        assert!(!quota.would_exceed(10));
        assert_eq!(quota.available_bytes(), None);
        assert_eq!(quota.used_pct(), 0.0);
    }

    #[test]
    fn used_pct_is_proportional() {
        let quota = StorageQuota::new(200, 50);
        assert!((quota.used_pct() - 25.0).abs() < f64::EPSILON);
    }
}
