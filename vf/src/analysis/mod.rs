//! AnalysisPoller - drives one item through remote analysis
//!
//! Wraps the bounded poll loop with the state transitions and notifications
//! around it. At most one loop runs per item id.

mod error;
mod poller;

pub use error::AnalysisError;
pub use poller::{PollConfig, PollOutcome, poll_until_done};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::DetectionApi;
use crate::domain::{AnalysisResult, ItemStatus};
use crate::notify::NotificationCenter;
use crate::state::{Action, StateStore};

/// Runs analyses and records their outcome in the state store
#[derive(Clone)]
pub struct AnalysisPoller {
    api: Arc<dyn DetectionApi>,
    store: StateStore,
    notifier: NotificationCenter,
    config: PollConfig,
    active: Arc<Mutex<HashSet<String>>>,
}

/// Marks an id as running until dropped
struct ActiveGuard {
    active: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl ActiveGuard {
    fn acquire(active: &Arc<Mutex<HashSet<String>>>, id: &str) -> Option<Self> {
        let inserted = active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string());
        inserted.then(|| Self {
            active: active.clone(),
            id: id.to_string(),
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

impl AnalysisPoller {
    pub fn new(
        api: Arc<dyn DetectionApi>,
        store: StateStore,
        notifier: NotificationCenter,
        config: PollConfig,
    ) -> Self {
        Self {
            api,
            store,
            notifier,
            config,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether a loop is currently running for `item_id`
    pub fn is_active(&self, item_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(item_id)
    }

    /// Analyze a registered item
    ///
    /// On success the result is registered (the item becomes `completed` and
    /// one credit is spent). Remote failures and timeouts set the item to
    /// `error`. An aborted run returns `Cancelled` and leaves state as it was
    /// when the abort landed.
    pub async fn analyze(&self, item_id: &str, abort: CancellationToken) -> Result<AnalysisResult, AnalysisError> {
        debug!(%item_id, "analyze: called");

        let snapshot = self.store.snapshot().await?;
        let item = snapshot
            .item(item_id)
            .cloned()
            .ok_or_else(|| AnalysisError::NotFound(item_id.to_string()))?;

        if item.status == ItemStatus::Completed {
            debug!(%item_id, "analyze: already completed");
            self.notifier
                .info(format!("{} has already been analyzed", item.name))
                .await?;
            return Err(AnalysisError::AlreadyAnalyzed(item.name));
        }

        let Some(_guard) = ActiveGuard::acquire(&self.active, item_id) else {
            debug!(%item_id, "analyze: loop already active");
            return Err(AnalysisError::AlreadyRunning(item.name));
        };

        self.store
            .dispatch(Action::SetItemStatus {
                id: item.id.clone(),
                status: ItemStatus::Processing,
                error: None,
            })
            .await?;
        self.notifier.info(format!("Analyzing {}...", item.name)).await?;
        info!(%item_id, name = %item.name, "analysis started");

        match poll_until_done(self.api.as_ref(), &item.id, self.config, &abort).await {
            Ok(remote) => {
                let result = remote.into_result(&item.id, &item.name);
                let after = self.store.dispatch(Action::AddProcessedItem(result.clone())).await?;
                if after.result(&item.id).is_none() {
                    warn!(%item_id, "item removed during analysis, discarding result");
                    return Err(AnalysisError::Removed(item.name));
                }
                self.notifier
                    .success(format!("Analysis completed for {}", item.name))
                    .await?;
                info!(%item_id, objects = result.total_objects, "analysis completed");
                Ok(result)
            }
            Err(AnalysisError::Cancelled) => {
                info!(%item_id, "analysis aborted");
                Err(AnalysisError::Cancelled)
            }
            Err(e) => {
                warn!(%item_id, error = %e, "analysis failed");
                if e.marks_item_failed() {
                    self.store
                        .dispatch(Action::SetItemStatus {
                            id: item.id.clone(),
                            status: ItemStatus::Error,
                            error: Some(e.to_string()),
                        })
                        .await?;
                    self.notifier
                        .error(format!("Failed to analyze {}: {}", item.name, e))
                        .await?;
                }
                Err(e)
            }
        }
    }
}
