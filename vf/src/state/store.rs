//! StateStore - actor that owns the AppState
//!
//! One task holds the state and applies dispatches strictly in arrival order,
//! so the reducer never races with itself. Readers get immutable `Arc`
//! snapshots; subscribers get a [`StateEvent`] for every change, emitted
//! before the dispatching caller is answered.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use super::action::Action;
use super::messages::{StateCommand, StateError, StateEvent, StateResponse};
use super::reducer::{AppState, reduce};

/// Capacity of the change broadcast; slow subscribers see `Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Handle to send commands to the StateStore
#[derive(Clone, Debug)]
pub struct StateStore {
    tx: mpsc::Sender<StateCommand>,
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateStore {
    /// Spawn a new StateStore actor seeded with `initial`
    pub fn spawn(initial: AppState) -> Self {
        debug!("StateStore::spawn: called");
        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(actor_loop(Arc::new(initial), rx, event_tx.clone()));

        info!("StateStore spawned");
        Self { tx, event_tx }
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    /// Apply an action and return the resulting snapshot
    pub async fn dispatch(&self, action: Action) -> StateResponse<Arc<AppState>> {
        debug!(action = action.kind(), "dispatch: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::Dispatch {
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> StateResponse<Arc<AppState>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)
    }

    /// Stop the actor; later calls fail with `ChannelError`
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

async fn actor_loop(
    mut state: Arc<AppState>,
    mut rx: mpsc::Receiver<StateCommand>,
    event_tx: broadcast::Sender<StateEvent>,
) {
    debug!("actor_loop: started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::Dispatch { action, reply } => {
                let kind = action.kind();
                let next = reduce(&state, action);
                if next != *state {
                    state = Arc::new(next);
                    // No subscribers is fine
                    let _ = event_tx.send(StateEvent::Changed {
                        action: kind,
                        snapshot: state.clone(),
                    });
                } else {
                    debug!(action = kind, "actor_loop: dispatch left state unchanged");
                }
                let _ = reply.send(state.clone());
            }
            StateCommand::Snapshot { reply } => {
                let _ = reply.send(state.clone());
            }
            StateCommand::Shutdown => {
                info!("StateStore shutting down");
                break;
            }
        }
    }
    debug!("actor_loop: exited");
}
