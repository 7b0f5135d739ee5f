//! VisionFlow - client-side orchestration for a remote object-detection service
//!
//! Turns fire-and-forget upload and analysis calls into a bounded, observable
//! workflow per media item, backed by one state store whose sanitized
//! projection survives restarts.
//!
//! # Modules
//!
//! - [`state`] - AppState, named actions, the reducer and the store actor
//! - [`notify`] - ephemeral notifications with independent expiry
//! - [`persistence`] - projection mirrored to a quota-limited slot
//! - [`upload`] - validation and the upload queue
//! - [`analysis`] - start-then-poll analysis loop with abort and timeout
//! - [`export`] - result downloads and export history
//! - [`api`] - the detection service trait and its HTTP client
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod analysis;
pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod notify;
pub mod persistence;
pub mod state;
pub mod upload;

pub use analysis::{AnalysisError, AnalysisPoller, PollConfig};
pub use api::{ApiError, DetectionApi, HttpDetectionClient};
pub use app::App;
pub use config::Config;
pub use export::{ExportError, ExportRecord, Exporter};
pub use notify::NotificationCenter;
pub use persistence::{PersistenceAdapter, SaveOutcome};
pub use state::{Action, AppState, StateStore};
pub use upload::{MediaFile, QueueEntry, UploadError, UploadQueueManager};
