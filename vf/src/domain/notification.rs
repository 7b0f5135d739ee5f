//! Notification domain type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a notification should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// Short-lived user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Time-to-live in milliseconds
    pub ttl_ms: u64,
}

impl Notification {
    /// Create a notification stamped with the current time
    pub fn new(id: u64, severity: Severity, message: impl Into<String>, ttl: std::time::Duration) -> Self {
        Self {
            id,
            severity,
            message: message.into(),
            created_at: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }
}
