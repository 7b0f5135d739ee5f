//! HTTP implementation of DetectionApi
//!
//! Talks JSON to the detection service with reqwest. Every request carries a
//! client timeout; status polls use their own shorter one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use super::types::ErrorBody;
use super::{AnalysisStatus, ApiError, DetectionApi, MediaUpload, UploadResponse};
use crate::config::ApiConfig;
use crate::domain::ExportFormat;

/// Detection service client
pub struct HttpDetectionClient {
    endpoint: String,
    http: Client,
    timeout: Duration,
    poll_timeout: Duration,
}

impl HttpDetectionClient {
    /// Create a client from the API section of the config
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: api_root(&config.base_url),
            http,
            timeout,
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
        })
    }

    /// Root every endpoint path is appended to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Send a request, mapping timeouts and non-2xx statuses
    async fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Response, ApiError> {
        let response = request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(timeout)
            } else {
                ApiError::Network(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let detail = error_detail(&text).unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
        });
        debug!(status = status.as_u16(), %detail, "send: API error");
        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl DetectionApi for HttpDetectionClient {
    async fn upload(&self, file: MediaUpload) -> Result<UploadResponse, ApiError> {
        debug!(file_name = %file.file_name, size = file.bytes.len(), "upload: called");
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .send(self.http.post(self.url("/upload")).multipart(form), self.timeout)
            .await?;
        let body = response.text().await?;
        let parsed: UploadResponse = serde_json::from_str(&body)?;
        if parsed.file_id.is_empty() {
            return Err(ApiError::InvalidResponse("upload response missing file_id".to_string()));
        }
        Ok(parsed)
    }

    async fn start_analysis(&self, file_id: &str) -> Result<(), ApiError> {
        debug!(%file_id, "start_analysis: called");
        self.send(self.http.post(self.url(&format!("/analyze/{file_id}"))), self.timeout)
            .await?;
        Ok(())
    }

    async fn analysis_status(&self, file_id: &str) -> Result<AnalysisStatus, ApiError> {
        debug!(%file_id, "analysis_status: called");
        let response = self
            .send(
                self.http.get(self.url(&format!("/analysis/{file_id}"))),
                self.poll_timeout,
            )
            .await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(%file_id, error = %e, "analysis_status: unparseable status body");
            ApiError::InvalidResponse(format!("unrecognized analysis status: {e}"))
        })
    }

    async fn export(&self, file_id: &str, format: ExportFormat) -> Result<Vec<u8>, ApiError> {
        debug!(%file_id, %format, "export: called");
        let request = self
            .http
            .get(self.url(&format!("/export/{file_id}")))
            .query(&[("format", format.as_str())]);
        let response = self.send(request, self.timeout).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, file_id: &str) -> Result<(), ApiError> {
        debug!(%file_id, "delete: called");
        self.send(self.http.delete(self.url(&format!("/files/{file_id}"))), self.timeout)
            .await?;
        Ok(())
    }

    async fn health(&self) -> Result<String, ApiError> {
        debug!("health: called");
        let response = self.send(self.http.get(self.url("/")), self.timeout).await?;
        let body = response.text().await?;
        // The service answers `{"message": "..."}`; fall back to the raw body
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        Ok(message)
    }
}

/// Normalize a base URL into the API root
///
/// A trailing slash is dropped and `/api` is appended unless already present.
pub fn api_root(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/api")
    }
}

/// Extract the server's `detail` message from an error body
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
