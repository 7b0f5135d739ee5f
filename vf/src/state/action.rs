//! Named state actions
//!
//! Actions serialize as `{"type": "ADD_UPLOADED_ITEM", "payload": {...}}`.
//! Any `type` this build does not know becomes [`Action::Unknown`], whatever
//! payload it carries, and the reducer treats it as a no-op.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::domain::{AnalysisResult, ItemStatus, Notification, Settings, SettingsPatch, UploadItem};

/// Full or partial state used to seed the store on startup
///
/// Present fields replace the corresponding part of the state; absent fields
/// leave it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadPayload {
    pub credits: Option<u32>,
    pub uploaded_items: Option<Vec<UploadItem>>,
    pub processed_items: Option<Vec<AnalysisResult>>,
    pub settings: Option<Settings>,
}

/// Every mutation the state store understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    SetCredits(u32),
    /// Register a stored item; +1 credit
    AddUploadedItem(UploadItem),
    /// Register or replace an analysis result; -1 credit when new, floored at 0
    AddProcessedItem(AnalysisResult),
    SetItemStatus {
        id: String,
        status: ItemStatus,
        error: Option<String>,
    },
    /// Remove an item and its result
    RemoveItem(String),
    UpdateSettings(SettingsPatch),
    AddNotification(Notification),
    RemoveNotification(u64),
    LoadState(LoadPayload),
    ResetAll,
    #[serde(other)]
    Unknown,
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Action::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let tag = value.get("type").and_then(Value::as_str);
        if tag.is_some_and(|t| !Action::KNOWN_KINDS.contains(&t)) {
            return Ok(Action::Unknown);
        }
        Action::deserialize(value).map_err(D::Error::custom)
    }
}

impl Action {
    /// Wire tags of every action except `Unknown`
    pub const KNOWN_KINDS: &'static [&'static str] = &[
        "SET_CREDITS",
        "ADD_UPLOADED_ITEM",
        "ADD_PROCESSED_ITEM",
        "SET_ITEM_STATUS",
        "REMOVE_ITEM",
        "UPDATE_SETTINGS",
        "ADD_NOTIFICATION",
        "REMOVE_NOTIFICATION",
        "LOAD_STATE",
        "RESET_ALL",
    ];

    /// Stable name for logs and change events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetCredits(_) => "SET_CREDITS",
            Self::AddUploadedItem(_) => "ADD_UPLOADED_ITEM",
            Self::AddProcessedItem(_) => "ADD_PROCESSED_ITEM",
            Self::SetItemStatus { .. } => "SET_ITEM_STATUS",
            Self::RemoveItem(_) => "REMOVE_ITEM",
            Self::UpdateSettings(_) => "UPDATE_SETTINGS",
            Self::AddNotification(_) => "ADD_NOTIFICATION",
            Self::RemoveNotification(_) => "REMOVE_NOTIFICATION",
            Self::LoadState(_) => "LOAD_STATE",
            Self::ResetAll => "RESET_ALL",
            Self::Unknown => "UNKNOWN",
        }
    }
}
