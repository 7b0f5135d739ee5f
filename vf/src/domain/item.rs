//! UploadItem domain type
//!
//! A media file that has been stored by the remote service and is tracked
//! through analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of media an item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Accepted extensions with their media kind and MIME type
pub const SUPPORTED_FORMATS: &[(&str, MediaKind, &str)] = &[
    ("jpg", MediaKind::Image, "image/jpeg"),
    ("jpeg", MediaKind::Image, "image/jpeg"),
    ("png", MediaKind::Image, "image/png"),
    ("gif", MediaKind::Image, "image/gif"),
    ("webp", MediaKind::Image, "image/webp"),
    ("bmp", MediaKind::Image, "image/bmp"),
    ("mp4", MediaKind::Video, "video/mp4"),
    ("avi", MediaKind::Video, "video/x-msvideo"),
    ("mov", MediaKind::Video, "video/quicktime"),
    ("mkv", MediaKind::Video, "video/x-matroska"),
    ("webm", MediaKind::Video, "video/webm"),
    ("flv", MediaKind::Video, "video/x-flv"),
];

/// Look up the media kind and MIME type for a file name by its extension
///
/// Matching is case-insensitive; names without an extension never match.
pub fn media_type_for(file_name: &str) -> Option<(MediaKind, &'static str)> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_FORMATS
        .iter()
        .find(|(candidate, _, _)| *candidate == ext)
        .map(|(_, kind, mime)| (*kind, *mime))
}

/// Lifecycle status of an item
///
/// `uploading -> ready -> processing -> {completed, error}`; `error` is
/// reachable from every non-terminal state and may re-enter `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Accepted locally, remote store call in flight
    Uploading,
    /// Stored remotely, awaiting analysis
    #[default]
    Ready,
    /// Analysis triggered, poll loop running
    Processing,
    /// Analysis result registered
    Completed,
    /// Failed; carries a message on the item
    Error,
}

impl ItemStatus {
    /// Check if a transition from this status to `next` is legal
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Uploading, Ready)
                | (Uploading, Error)
                | (Ready, Processing)
                | (Ready, Error)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Error)
                | (Error, Processing)
        )
    }

    /// Completed is the only state nothing can leave
    pub fn is_terminal(self) -> bool {
        self == ItemStatus::Completed
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uploading => write!(f, "uploading"),
            Self::Ready => write!(f, "ready"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A media item registered with the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    /// Server-assigned file id
    pub id: String,

    /// Original file name
    pub name: String,

    /// Size in bytes
    pub size: u64,

    pub kind: MediaKind,

    /// Local preview as a data URL; held in memory only
    #[serde(default)]
    pub preview: Option<String>,

    pub uploaded_at: DateTime<Utc>,

    pub status: ItemStatus,

    /// Message for the last failure, set while status is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadItem {
    /// Create a freshly stored item in `ready` status
    pub fn ready(id: impl Into<String>, name: impl Into<String>, size: u64, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            kind,
            preview: None,
            uploaded_at: Utc::now(),
            status: ItemStatus::Ready,
            error: None,
        }
    }

    /// Attach a preview handle
    pub fn with_preview(mut self, preview: Option<String>) -> Self {
        self.preview = preview;
        self
    }
}
