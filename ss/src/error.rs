//! Slot storage error types

use thiserror::Error;

/// Errors from slot operations
#[derive(Debug, Error)]
pub enum SlotError {
    #[error("Quota exceeded: write needs {needed} bytes, quota is {quota} bytes")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("Invalid slot key: {0:?}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SlotError {
    /// Check if this error means the store is full
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, SlotError::QuotaExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_quota_exceeded() {
        assert!(SlotError::QuotaExceeded { needed: 10, quota: 5 }.is_quota_exceeded());
        assert!(!SlotError::InvalidKey("x y".to_string()).is_quota_exceeded());
        assert!(!SlotError::Io(std::io::Error::other("disk")).is_quota_exceeded());
    }
}
