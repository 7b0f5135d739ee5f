//! DetectionApi trait definition

use async_trait::async_trait;

use super::{AnalysisStatus, ApiError, MediaUpload, UploadResponse};
use crate::domain::ExportFormat;

/// Every call the client makes to the detection service
///
/// Implementations are stateless: each call is an independent request, so
/// one client can be shared by any number of concurrent uploads and poll
/// loops.
#[async_trait]
pub trait DetectionApi: Send + Sync {
    /// Store a file; returns the id the service assigned
    async fn upload(&self, file: MediaUpload) -> Result<UploadResponse, ApiError>;

    /// Trigger analysis of a stored file (acknowledgment only)
    async fn start_analysis(&self, file_id: &str) -> Result<(), ApiError>;

    /// Current analysis status for a file
    async fn analysis_status(&self, file_id: &str) -> Result<AnalysisStatus, ApiError>;

    /// Download the results of an analyzed file in the given format
    async fn export(&self, file_id: &str, format: ExportFormat) -> Result<Vec<u8>, ApiError>;

    /// Delete a stored file and its results
    async fn delete(&self, file_id: &str) -> Result<(), ApiError>;

    /// Liveness probe; returns the service banner
    async fn health(&self) -> Result<String, ApiError>;
}
