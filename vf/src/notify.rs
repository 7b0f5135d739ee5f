//! NotificationCenter - ephemeral user messages with auto-expiry
//!
//! Each notification lives in the AppState until its own expiry task removes
//! it or it is dismissed. Timers are independent: expiring or dismissing one
//! notification never touches another.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{Notification, Severity, next_notification_id};
use crate::state::{Action, AppState, StateEvent, StateResponse, StateStore};

/// Default time-to-live for a notification
pub const DEFAULT_TTL: Duration = Duration::from_millis(5000);

/// Emits notifications into the state store and expires them
#[derive(Clone, Debug)]
pub struct NotificationCenter {
    store: StateStore,
    default_ttl: Duration,
    timers: Arc<Mutex<HashMap<u64, AbortHandle>>>,
}

impl NotificationCenter {
    pub fn new(store: StateStore, default_ttl: Duration) -> Self {
        Self {
            store,
            default_ttl,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Append a notification and start its expiry timer
    pub async fn notify(
        &self,
        severity: Severity,
        message: impl Into<String>,
        ttl: Option<Duration>,
    ) -> StateResponse<u64> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let id = next_notification_id();
        let notification = Notification::new(id, severity, message, ttl);
        debug!(id, %severity, message = %notification.message, "notify: called");

        self.store.dispatch(Action::AddNotification(notification)).await?;

        let store = self.store.clone();
        let timers = self.timers.clone();
        // Hold the lock across spawn so the task cannot remove its entry first
        let mut guard = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            debug!(id, "notification expired");
            let _ = store.dispatch(Action::RemoveNotification(id)).await;
            timers.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
        });
        guard.insert(id, handle.abort_handle());
        Ok(id)
    }

    /// Remove a notification now and cancel its expiry
    pub async fn dismiss(&self, id: u64) -> StateResponse<()> {
        debug!(id, "dismiss: called");
        if let Some(handle) = self.timers.lock().unwrap_or_else(|e| e.into_inner()).remove(&id) {
            handle.abort();
        }
        self.store.dispatch(Action::RemoveNotification(id)).await?;
        Ok(())
    }

    /// Number of expiry timers still pending
    pub fn pending(&self) -> usize {
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub async fn success(&self, message: impl Into<String>) -> StateResponse<u64> {
        self.notify(Severity::Success, message, None).await
    }

    pub async fn error(&self, message: impl Into<String>) -> StateResponse<u64> {
        self.notify(Severity::Error, message, None).await
    }

    pub async fn warning(&self, message: impl Into<String>) -> StateResponse<u64> {
        self.notify(Severity::Warning, message, None).await
    }

    pub async fn info(&self, message: impl Into<String>) -> StateResponse<u64> {
        self.notify(Severity::Info, message, None).await
    }
}

/// Call `on_new` once for every notification that appears after `events` was subscribed
///
/// A lagged subscription resyncs from a fresh snapshot, so nothing still in
/// the state is missed. On `stop` the events already queued are handled
/// before the task ends.
pub fn follow_notifications<F>(
    store: &StateStore,
    mut events: Receiver<StateEvent>,
    stop: CancellationToken,
    mut on_new: F,
) -> JoinHandle<()>
where
    F: FnMut(&Notification) + Send + 'static,
{
    let store = store.clone();
    tokio::spawn(async move {
        let mut seen = HashSet::new();
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    let mut lagged = false;
                    loop {
                        match events.try_recv() {
                            Ok(StateEvent::Changed { snapshot, .. }) => emit_new(&snapshot, &mut seen, &mut on_new),
                            Err(TryRecvError::Lagged(_)) => lagged = true,
                            Err(_) => break,
                        }
                    }
                    if lagged && let Ok(snapshot) = store.snapshot().await {
                        emit_new(&snapshot, &mut seen, &mut on_new);
                    }
                    break;
                }
                event = events.recv() => match event {
                    Ok(StateEvent::Changed { snapshot, .. }) => emit_new(&snapshot, &mut seen, &mut on_new),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "notification follower lagged, resyncing from snapshot");
                        match store.snapshot().await {
                            Ok(snapshot) => emit_new(&snapshot, &mut seen, &mut on_new),
                            Err(_) => break,
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("notification follower stopped");
    })
}

fn emit_new<F: FnMut(&Notification)>(state: &AppState, seen: &mut HashSet<u64>, on_new: &mut F) {
    for n in &state.notifications {
        if seen.insert(n.id) {
            on_new(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    fn center(ttl_ms: u64) -> (StateStore, NotificationCenter) {
        let store = StateStore::spawn(AppState::default());
        let center = NotificationCenter::new(store.clone(), Duration::from_millis(ttl_ms));
        (store, center)
    }

    #[tokio::test]
    async fn test_notify_appends_in_order() {
        let (store, center) = center(60_000);
        let first = center.info("first").await.unwrap();
        let second = center.error("second").await.unwrap();
        let third = center.info("first").await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        let ids: Vec<u64> = snapshot.notifications.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first, second, third]);
        assert_eq!(snapshot.notifications[1].severity, Severity::Error);
        assert_eq!(center.pending(), 3);
    }

    #[tokio::test]
    async fn test_notification_expires_after_ttl() {
        let (store, center) = center(60_000);
        center
            .notify(Severity::Success, "short", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        let keep = center.info("long").await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.notifications.len(), 1);
        assert_eq!(snapshot.notifications[0].id, keep);
        assert_eq!(center.pending(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_removes_and_cancels_timer() {
        let (store, center) = center(60_000);
        let id = center.warning("dismiss me").await.unwrap();
        center.dismiss(id).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.notifications.is_empty());
        assert_eq!(center.pending(), 0);
    }

    fn collector() -> (Arc<Mutex<Vec<String>>>, impl FnMut(&Notification) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |n: &Notification| sink.lock().unwrap().push(n.message.clone()))
    }

    #[tokio::test]
    async fn test_follower_reports_each_notification_once() {
        let (store, center) = center(60_000);
        let (seen, sink) = collector();
        let stop = CancellationToken::new();
        let follower = follow_notifications(&store, store.subscribe(), stop.clone(), sink);

        center.info("one").await.unwrap();
        center.success("two").await.unwrap();
        stop.cancel();
        follower.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_follower_resyncs_after_lag() {
        let store = StateStore::spawn(AppState::default());
        let events = store.subscribe();
        // Overflow the change channel before the follower reads anything
        for i in 0..300 {
            let n = Notification::new(next_notification_id(), Severity::Info, format!("n{i}"), DEFAULT_TTL);
            store.dispatch(Action::AddNotification(n)).await.unwrap();
        }

        let (seen, sink) = collector();
        let stop = CancellationToken::new();
        let follower = follow_notifications(&store, events, stop.clone(), sink);
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.cancel();
        follower.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 300);
        assert_eq!(seen[0], "n0");
        assert_eq!(seen[299], "n299");
    }

    #[tokio::test]
    async fn test_dismiss_unknown_id_is_harmless() {
        let (store, center) = center(60_000);
        center.info("stays").await.unwrap();
        center.dismiss(42).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap().notifications.len(), 1);
    }
}
