//! State store messages
//!
//! Commands and responses for the actor pattern.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use super::action::Action;
use super::reducer::AppState;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("State store is not running")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateStore actor
#[derive(Debug)]
pub enum StateCommand {
    Dispatch {
        action: Action,
        reply: oneshot::Sender<Arc<AppState>>,
    },
    Snapshot {
        reply: oneshot::Sender<Arc<AppState>>,
    },
    Shutdown,
}

/// Broadcast after every dispatch that changed the state
#[derive(Debug, Clone)]
pub enum StateEvent {
    Changed {
        /// `Action::kind` of the action that produced this snapshot
        action: &'static str,
        snapshot: Arc<AppState>,
    },
}
