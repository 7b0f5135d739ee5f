//! Domain types for VisionFlow
//!
//! Core records tracked by the state store: UploadItem, AnalysisResult,
//! Notification and Settings. All are plain serde values; nothing in here
//! touches the network or the clock except the id helpers.

mod analysis;
mod id;
mod item;
mod notification;
mod settings;

pub use analysis::{AnalysisResult, Detection};
pub use id::{next_notification_id, queue_entry_id};
pub use item::{ItemStatus, MediaKind, SUPPORTED_FORMATS, UploadItem, media_type_for};
pub use notification::{Notification, Severity};
pub use settings::{COCO_CLASSES, ExportFormat, ProcessingQuality, Settings, SettingsPatch, Theme};
