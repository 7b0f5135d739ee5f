//! Remote service error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur talking to the detection service
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response; `detail` is the server's message when it sent one
    #[error("{detail}")]
    Status { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Check if a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            ApiError::Network(_) => true,
            ApiError::Timeout(_) => true,
            ApiError::InvalidResponse(_) => false,
            ApiError::Json(_) => false,
        }
    }

    /// HTTP status when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
