//! Analysis error types

use thiserror::Error;

use crate::api::ApiError;
use crate::state::StateError;

/// Ways an analysis run can end without a result
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("{0} has already been analyzed")]
    AlreadyAnalyzed(String),

    #[error("Analysis already running for {0}")]
    AlreadyRunning(String),

    /// The start call failed; no job exists remotely
    #[error("{0}")]
    StartFailed(ApiError),

    /// The service reported the job as failed; holds its detail verbatim
    #[error("{0}")]
    Remote(String),

    /// A poll failed in a way that ended the loop
    #[error("{0}")]
    Transport(ApiError),

    #[error("Analysis timed out")]
    TimedOut { attempts: u32 },

    #[error("Analysis cancelled")]
    Cancelled,

    /// The item was removed while its loop ran; the result was discarded
    #[error("{0} was removed before analysis completed")]
    Removed(String),

    #[error(transparent)]
    State(#[from] StateError),
}

impl AnalysisError {
    /// Failures that leave the item in `error` status
    pub fn marks_item_failed(&self) -> bool {
        matches!(
            self,
            AnalysisError::StartFailed(_)
                | AnalysisError::Remote(_)
                | AnalysisError::Transport(_)
                | AnalysisError::TimedOut { .. }
        )
    }
}
