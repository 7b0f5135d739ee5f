//! AppState and the reducer
//!
//! `reduce` is a pure, total function: it never fails, never performs I/O and
//! always returns a complete state. Actions that do not apply (unknown ids,
//! illegal status transitions, unknown action types) return the state
//! unchanged.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{AnalysisResult, ItemStatus, MediaKind, Notification, Settings, UploadItem};

use super::action::{Action, LoadPayload};

/// The aggregate application state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Outstanding (uploaded but not yet analyzed) items
    pub credits: u32,
    pub uploaded_items: Vec<UploadItem>,
    pub processed_items: Vec<AnalysisResult>,
    pub settings: Settings,
    pub notifications: Vec<Notification>,
}

/// Dashboard counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_images: usize,
    pub total_videos: usize,
    pub total_processed: usize,
    pub total_objects: u64,
}

impl AppState {
    pub fn item(&self, id: &str) -> Option<&UploadItem> {
        self.uploaded_items.iter().find(|i| i.id == id)
    }

    pub fn result(&self, id: &str) -> Option<&AnalysisResult> {
        self.processed_items.iter().find(|r| r.id == id)
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats {
            total_images: self.uploaded_items.iter().filter(|i| i.kind == MediaKind::Image).count(),
            total_videos: self.uploaded_items.iter().filter(|i| i.kind == MediaKind::Video).count(),
            total_processed: self.processed_items.len(),
            total_objects: self.processed_items.iter().map(|r| r.total_objects as u64).sum(),
        }
    }

    /// The `limit` most recently processed results, newest first
    pub fn recent_activity(&self, limit: usize) -> Vec<&AnalysisResult> {
        let mut recent: Vec<&AnalysisResult> = self.processed_items.iter().collect();
        recent.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        recent.truncate(limit);
        recent
    }
}

/// Apply one action to a state, producing the next state
pub fn reduce(state: &AppState, action: Action) -> AppState {
    debug!(action = action.kind(), "reduce: called");
    match action {
        Action::SetCredits(credits) => AppState {
            credits,
            ..state.clone()
        },
        Action::AddUploadedItem(item) => add_uploaded_item(state, item),
        Action::AddProcessedItem(result) => add_processed_item(state, result),
        Action::SetItemStatus { id, status, error } => set_item_status(state, &id, status, error),
        Action::RemoveItem(id) => {
            let mut next = state.clone();
            next.uploaded_items.retain(|i| i.id != id);
            next.processed_items.retain(|r| r.id != id);
            next
        }
        Action::UpdateSettings(patch) => AppState {
            settings: state.settings.merged(patch),
            ..state.clone()
        },
        Action::AddNotification(notification) => {
            let mut next = state.clone();
            next.notifications.push(notification);
            next
        }
        Action::RemoveNotification(id) => {
            let mut next = state.clone();
            next.notifications.retain(|n| n.id != id);
            next
        }
        Action::LoadState(payload) => load_state(state, payload),
        Action::ResetAll => AppState::default(),
        Action::Unknown => {
            debug!("reduce: unknown action ignored");
            state.clone()
        }
    }
}

fn add_uploaded_item(state: &AppState, item: UploadItem) -> AppState {
    let mut next = state.clone();
    match next.uploaded_items.iter_mut().find(|i| i.id == item.id) {
        // Same server id registered twice: refresh, no extra credit
        Some(existing) => *existing = item,
        None => {
            next.uploaded_items.push(item);
            next.credits = next.credits.saturating_add(1);
        }
    }
    next
}

fn add_processed_item(state: &AppState, result: AnalysisResult) -> AppState {
    if state.item(&result.id).is_none() {
        debug!(id = %result.id, "add_processed_item: no uploaded item, ignored");
        return state.clone();
    }

    let mut next = state.clone();
    if let Some(item) = next.uploaded_items.iter_mut().find(|i| i.id == result.id) {
        item.status = ItemStatus::Completed;
        item.error = None;
    }
    match next.processed_items.iter_mut().find(|r| r.id == result.id) {
        Some(existing) => *existing = result,
        None => {
            next.processed_items.push(result);
            next.credits = next.credits.saturating_sub(1);
        }
    }
    next
}

fn set_item_status(state: &AppState, id: &str, status: ItemStatus, error: Option<String>) -> AppState {
    let Some(current) = state.item(id) else {
        return state.clone();
    };
    if !current.status.can_transition_to(status) {
        debug!(%id, from = %current.status, to = %status, "set_item_status: illegal transition ignored");
        return state.clone();
    }

    let mut next = state.clone();
    if let Some(item) = next.uploaded_items.iter_mut().find(|i| i.id == id) {
        item.status = status;
        item.error = if status == ItemStatus::Error { error } else { None };
    }
    next
}

fn load_state(state: &AppState, payload: LoadPayload) -> AppState {
    let mut next = state.clone();
    if let Some(credits) = payload.credits {
        next.credits = credits;
    }
    if let Some(items) = payload.uploaded_items {
        next.uploaded_items = items;
    }
    if let Some(results) = payload.processed_items {
        next.processed_items = results;
    }
    if let Some(settings) = payload.settings {
        next.settings = settings;
    }
    // A result may only exist for a known item, and only once
    let mut seen = std::collections::HashSet::new();
    let items = &next.uploaded_items;
    next.processed_items
        .retain(|r| items.iter().any(|i| i.id == r.id) && seen.insert(r.id.clone()));
    next
}
