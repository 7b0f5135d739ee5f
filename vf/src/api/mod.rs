//! Detection service client
//!
//! All network access goes through the [`DetectionApi`] trait so a fake
//! transport can be injected in tests.

pub mod client;
mod error;
mod http;
mod types;

pub use client::DetectionApi;
pub use error::ApiError;
pub use http::{HttpDetectionClient, api_root};
pub use types::{AnalysisStatus, MediaUpload, RemoteAnalysis, RemoteDetection, UploadResponse};
