//! PersistenceAdapter - mirrors a sanitized projection of the state to a slot
//!
//! Only identity and summary fields are written: previews, detections and
//! image payloads stay in memory. When the slot quota is exceeded the slot is
//! cleared rather than left stale, and the next write that fits fills it
//! again.
//!
//! Loading never fails on content: a field that is missing or unreadable takes
//! its default, and a list entry without a usable `id` is dropped on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use slotstore::{SlotError, SlotStorage};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{AnalysisResult, ItemStatus, MediaKind, Settings, UploadItem};
use crate::state::{Action, AppState, LoadPayload, StateEvent, StateResponse, StateStore};

/// Slot holding the persisted projection
pub const STATE_KEY: &str = "visionflow-state";

/// Longest item name kept in the projection
const MAX_PERSISTED_NAME: usize = 255;

/// The persisted form of [`AppState`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(deserialize_with = "or_default")]
    pub credits: u32,
    #[serde(deserialize_with = "usable_entries")]
    pub uploaded_files: Vec<PersistedItem>,
    #[serde(deserialize_with = "usable_entries")]
    pub processed_files: Vec<PersistedResult>,
    #[serde(deserialize_with = "lenient_settings")]
    pub settings: Settings,
}

/// Timestamps that are missing or unreadable load as the Unix epoch; an empty
/// name is replaced by the id when the state is restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedItem {
    pub id: String,
    #[serde(default, deserialize_with = "or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub size: u64,
    #[serde(rename = "type", default, deserialize_with = "or_default")]
    pub kind: MediaKind,
    #[serde(default, deserialize_with = "or_default")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "or_default")]
    pub status: ItemStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedResult {
    pub id: String,
    #[serde(default, deserialize_with = "or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "or_default")]
    pub total_objects: u32,
    #[serde(rename = "processedAt", default, deserialize_with = "or_default")]
    pub processed_at: DateTime<Utc>,
}

fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn usable_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(entries) = Value::deserialize(deserializer)? else {
        warn!("persisted list is not an array, ignoring it");
        return Ok(Vec::new());
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "dropping unusable persisted entry");
                None
            }
        })
        .collect())
}

/// Apply persisted settings one key at a time over the defaults
fn lenient_settings<'de, D>(deserializer: D) -> Result<Settings, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(fields) = Value::deserialize(deserializer)? else {
        return Ok(Settings::default());
    };
    let mut settings = Settings::default();
    for (key, value) in fields {
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&settings) else {
            break;
        };
        merged.insert(key.clone(), value);
        match serde_json::from_value::<Settings>(Value::Object(merged)) {
            Ok(next) => settings = next,
            Err(e) => warn!(key = %key, error = %e, "ignoring unreadable persisted setting"),
        }
    }
    Ok(settings)
}

fn name_or_id(name: String, id: &str) -> String {
    if name.is_empty() { id.to_string() } else { name }
}

/// Project the state down to what is safe to persist
pub fn project(state: &AppState) -> PersistedState {
    PersistedState {
        credits: state.credits,
        uploaded_files: state
            .uploaded_items
            .iter()
            .map(|i| PersistedItem {
                id: i.id.clone(),
                name: truncate_name(&i.name),
                size: i.size,
                kind: i.kind,
                uploaded_at: i.uploaded_at,
                status: i.status,
            })
            .collect(),
        processed_files: state
            .processed_items
            .iter()
            .map(|r| PersistedResult {
                id: r.id.clone(),
                name: truncate_name(&r.name),
                total_objects: r.total_objects,
                processed_at: r.processed_at,
            })
            .collect(),
        settings: state.settings.clone(),
    }
}

fn truncate_name(name: &str) -> String {
    name.chars().take(MAX_PERSISTED_NAME).collect()
}

impl PersistedState {
    /// Turn a loaded projection into a `LoadState` payload
    ///
    /// No poll loop survives a restart, so in-flight items come back as
    /// `ready` and can be analyzed again.
    pub fn into_load_payload(self) -> LoadPayload {
        let uploaded_items = self
            .uploaded_files
            .into_iter()
            .map(|p| UploadItem {
                name: name_or_id(p.name, &p.id),
                id: p.id,
                size: p.size,
                kind: p.kind,
                preview: None,
                uploaded_at: p.uploaded_at,
                status: match p.status {
                    ItemStatus::Uploading | ItemStatus::Processing => ItemStatus::Ready,
                    other => other,
                },
                error: None,
            })
            .collect();
        let processed_items = self
            .processed_files
            .into_iter()
            .map(|p| AnalysisResult {
                name: name_or_id(p.name, &p.id),
                id: p.id,
                detections: Vec::new(),
                total_objects: p.total_objects,
                processing_time: 0.0,
                processed_at: p.processed_at,
                file_type: None,
                image_data: None,
            })
            .collect();
        LoadPayload {
            credits: Some(self.credits),
            uploaded_items: Some(uploaded_items),
            processed_items: Some(processed_items),
            settings: Some(self.settings),
        }
    }
}

/// What a save did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// Quota exceeded; the slot was cleared
    Cleared,
    /// Any other storage failure; the slot is left as it was
    Failed,
}

/// Reads and writes the persisted projection
#[derive(Clone)]
pub struct PersistenceAdapter {
    slots: Arc<dyn SlotStorage>,
}

impl PersistenceAdapter {
    pub fn new(slots: Arc<dyn SlotStorage>) -> Self {
        Self { slots }
    }

    /// Write the projection of `state`
    pub fn save(&self, state: &AppState) -> SaveOutcome {
        self.write(&project(state))
    }

    fn write(&self, projection: &PersistedState) -> SaveOutcome {
        match slotstore::write_json(self.slots.as_ref(), STATE_KEY, projection) {
            Ok(()) => {
                debug!(
                    items = projection.uploaded_files.len(),
                    results = projection.processed_files.len(),
                    "write: saved projection"
                );
                SaveOutcome::Written
            }
            Err(e) if e.is_quota_exceeded() => {
                warn!(error = %e, "state exceeds storage quota, clearing persisted state");
                if let Err(e) = self.slots.remove(STATE_KEY) {
                    warn!(error = %e, "failed to clear persisted state");
                }
                SaveOutcome::Cleared
            }
            Err(e) => {
                warn!(error = %e, "failed to persist state");
                SaveOutcome::Failed
            }
        }
    }

    /// Read the persisted projection; unreadable data counts as none
    pub fn load(&self) -> Option<PersistedState> {
        match slotstore::read_json::<PersistedState>(self.slots.as_ref(), STATE_KEY) {
            Ok(state) => state,
            Err(SlotError::Json(e)) => {
                warn!(error = %e, "persisted state is corrupt, starting fresh");
                None
            }
            Err(e) => {
                warn!(error = %e, "failed to read persisted state, starting fresh");
                None
            }
        }
    }

    /// Seed the store from the slot with a single `LoadState`
    ///
    /// Returns whether prior state was found.
    pub async fn restore(&self, store: &StateStore) -> StateResponse<bool> {
        debug!("restore: called");
        let Some(persisted) = self.load() else {
            info!("No persisted state found");
            return Ok(false);
        };
        store.dispatch(Action::LoadState(persisted.into_load_payload())).await?;
        info!("Restored persisted state");
        Ok(true)
    }

    /// Remove the persisted projection
    pub fn clear(&self) -> Result<(), SlotError> {
        self.slots.remove(STATE_KEY)
    }

    /// Mirror every state change to the slot until `shutdown` fires
    ///
    /// Unchanged projections (notification churn, for instance) are not
    /// rewritten. On shutdown any events already queued are flushed.
    pub fn spawn_mirror(&self, store: &StateStore, shutdown: CancellationToken) -> JoinHandle<()> {
        debug!("spawn_mirror: called");
        let adapter = self.clone();
        let store = store.clone();
        let mut events = store.subscribe();

        tokio::spawn(async move {
            let mut last: Option<PersistedState> = None;
            loop {
                let snapshot = tokio::select! {
                    _ = shutdown.cancelled() => {
                        let mut latest = None;
                        loop {
                            match events.try_recv() {
                                Ok(StateEvent::Changed { snapshot, .. }) => latest = Some(snapshot),
                                Err(TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        if let Some(snapshot) = latest {
                            adapter.mirror(&snapshot, &mut last);
                        }
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(StateEvent::Changed { snapshot, .. }) => snapshot,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "persistence mirror lagged, resyncing from snapshot");
                            match store.snapshot().await {
                                Ok(snapshot) => snapshot,
                                Err(_) => break,
                            }
                        }
                        Err(RecvError::Closed) => break,
                    },
                };
                adapter.mirror(&snapshot, &mut last);
            }
            debug!("persistence mirror stopped");
        })
    }

    fn mirror(&self, state: &AppState, last: &mut Option<PersistedState>) {
        let projection = project(state);
        if last.as_ref() == Some(&projection) {
            return;
        }
        *last = match self.write(&projection) {
            SaveOutcome::Written => Some(projection),
            SaveOutcome::Cleared | SaveOutcome::Failed => None,
        };
    }
}
