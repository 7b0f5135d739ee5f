//! Exporter - downloads analysis results and keeps an export history

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slotstore::{SlotError, SlotStorage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, DetectionApi};
use crate::domain::ExportFormat;
use crate::notify::NotificationCenter;
use crate::state::{StateError, StateStore};

/// Slot holding the export history
pub const EXPORTS_KEY: &str = "visionflow-exports";

/// Most records kept in the history
pub const MAX_EXPORT_RECORDS: usize = 50;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("{0} has not been analyzed yet")]
    NotAnalyzed(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Slot(#[from] SlotError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// One completed export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub format: ExportFormat,
    pub exported_at: DateTime<Utc>,
    /// Bytes written
    pub size: u64,
    pub detection_count: u32,
    pub path: PathBuf,
}

/// File name an export of `name` is written under
pub fn export_file_name(name: &str, format: ExportFormat) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| name.to_string());
    format!("{}_results.{}", stem, format.file_extension())
}

/// Downloads exports for analyzed items
#[derive(Clone)]
pub struct Exporter {
    api: Arc<dyn DetectionApi>,
    store: StateStore,
    notifier: NotificationCenter,
    slots: Arc<dyn SlotStorage>,
}

impl Exporter {
    pub fn new(
        api: Arc<dyn DetectionApi>,
        store: StateStore,
        notifier: NotificationCenter,
        slots: Arc<dyn SlotStorage>,
    ) -> Self {
        Self {
            api,
            store,
            notifier,
            slots,
        }
    }

    /// Export an analyzed item into `out_dir`
    ///
    /// `format` defaults to the export format in the settings.
    pub async fn export(
        &self,
        item_id: &str,
        format: Option<ExportFormat>,
        out_dir: &Path,
    ) -> Result<ExportRecord, ExportError> {
        debug!(%item_id, ?format, out_dir = %out_dir.display(), "export: called");
        let snapshot = self.store.snapshot().await?;
        let item = snapshot
            .item(item_id)
            .ok_or_else(|| ExportError::NotFound(item_id.to_string()))?;
        let result = snapshot
            .result(item_id)
            .ok_or_else(|| ExportError::NotAnalyzed(item.name.clone()))?;
        let format = format.unwrap_or(snapshot.settings.export_format);
        let label = format.as_str().to_uppercase();

        self.notifier
            .info(format!("Exporting {} as {}...", item.name, label))
            .await?;

        let bytes = match self.api.export(item_id, format).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%item_id, %format, error = %e, "export failed");
                self.notifier.error(format!("Failed to export {label} format")).await?;
                return Err(e.into());
            }
        };

        tokio::fs::create_dir_all(out_dir).await?;
        let path = out_dir.join(export_file_name(&item.name, format));
        tokio::fs::write(&path, &bytes).await?;

        let record = ExportRecord {
            id: uuid::Uuid::now_v7().to_string(),
            file_id: item.id.clone(),
            file_name: item.name.clone(),
            format,
            exported_at: Utc::now(),
            size: bytes.len() as u64,
            detection_count: result.total_objects,
            path,
        };
        if let Err(e) = self.append_record(&record) {
            warn!(error = %e, "failed to record export history");
        }

        self.notifier
            .success(format!("{} exported successfully as {}", item.name, label))
            .await?;
        info!(%item_id, %format, path = %record.path.display(), size = record.size, "export written");
        Ok(record)
    }

    /// Export history, newest first
    pub fn history(&self) -> Result<Vec<ExportRecord>, ExportError> {
        match slotstore::read_json(self.slots.as_ref(), EXPORTS_KEY) {
            Ok(records) => Ok(records.unwrap_or_default()),
            Err(SlotError::Json(e)) => {
                warn!(error = %e, "export history is corrupt, ignoring it");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete one history record; returns whether it existed
    pub fn remove_record(&self, record_id: &str) -> Result<bool, ExportError> {
        let mut records = self.history()?;
        let before = records.len();
        records.retain(|r| r.id != record_id);
        if records.len() == before {
            return Ok(false);
        }
        slotstore::write_json(self.slots.as_ref(), EXPORTS_KEY, &records)?;
        Ok(true)
    }

    pub fn clear_history(&self) -> Result<(), ExportError> {
        self.slots.remove(EXPORTS_KEY)?;
        Ok(())
    }

    fn append_record(&self, record: &ExportRecord) -> Result<(), ExportError> {
        let mut records = self.history()?;
        records.insert(0, record.clone());
        records.truncate(MAX_EXPORT_RECORDS);
        slotstore::write_json(self.slots.as_ref(), EXPORTS_KEY, &records)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::mock::MockDetectionApi;
    use crate::domain::{AnalysisResult, MediaKind, Severity, UploadItem};
    use crate::state::{Action, AppState};
    use slotstore::MemorySlots;
    use std::time::Duration;

    async fn setup(api: MockDetectionApi, analyzed: bool) -> (StateStore, Exporter) {
        let store = StateStore::spawn(AppState::default());
        let notifier = NotificationCenter::new(store.clone(), Duration::from_secs(60));
        let exporter = Exporter::new(
            Arc::new(api),
            store.clone(),
            notifier,
            Arc::new(MemorySlots::new(1024 * 1024)),
        );
        store
            .dispatch(Action::AddUploadedItem(UploadItem::ready(
                "file-1",
                "street.view.jpg",
                10,
                MediaKind::Image,
            )))
            .await
            .unwrap();
        if analyzed {
            store
                .dispatch(Action::AddProcessedItem(AnalysisResult {
                    id: "file-1".to_string(),
                    name: "street.view.jpg".to_string(),
                    detections: Vec::new(),
                    total_objects: 4,
                    processing_time: 0.2,
                    processed_at: Utc::now(),
                    file_type: None,
                    image_data: None,
                }))
                .await
                .unwrap();
        }
        (store, exporter)
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("street.view.jpg", ExportFormat::Json), "street.view_results.json");
        assert_eq!(export_file_name("clip.mp4", ExportFormat::Yolo), "clip_results.zip");
        assert_eq!(export_file_name("noext", ExportFormat::Coco), "noext_results.zip");
    }

    #[tokio::test]
    async fn test_export_writes_file_and_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let (store, exporter) = setup(MockDetectionApi::new().with_exports(vec![Ok(b"{\"ok\":1}".to_vec())]), true).await;

        let record = exporter.export("file-1", None, dir.path()).await.unwrap();

        assert_eq!(record.format, ExportFormat::Json);
        assert_eq!(record.detection_count, 4);
        assert_eq!(record.size, 8);
        assert_eq!(record.path, dir.path().join("street.view_results.json"));
        assert_eq!(std::fs::read(&record.path).unwrap(), b"{\"ok\":1}");

        let history = exporter.history().unwrap();
        assert_eq!(history, vec![record]);

        let last = store.snapshot().await.unwrap().notifications.last().cloned().unwrap();
        assert_eq!(last.message, "street.view.jpg exported successfully as JSON");
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, exporter) = setup(MockDetectionApi::new(), true).await;

        let first = exporter.export("file-1", Some(ExportFormat::Yolo), dir.path()).await.unwrap();
        let second = exporter.export("file-1", Some(ExportFormat::Voc), dir.path()).await.unwrap();

        let history = exporter.history().unwrap();
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);

        assert!(exporter.remove_record(&first.id).unwrap());
        assert!(!exporter.remove_record(&first.id).unwrap());
        assert_eq!(exporter.history().unwrap().len(), 1);

        exporter.clear_history().unwrap();
        assert!(exporter.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unanalyzed_item_cannot_be_exported() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, exporter) = setup(MockDetectionApi::new(), false).await;

        let err = exporter.export("file-1", None, dir.path()).await.unwrap_err();
        assert!(matches!(err, ExportError::NotAnalyzed(_)));
        assert!(exporter.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_export_failure_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let (store, exporter) = setup(
            MockDetectionApi::new().with_exports(vec![Err(ApiError::Status {
                status: 500,
                detail: "Export failed".to_string(),
            })]),
            true,
        )
        .await;

        let err = exporter
            .export("file-1", Some(ExportFormat::Coco), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Api(_)));

        let last = store.snapshot().await.unwrap().notifications.last().cloned().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.message, "Failed to export COCO format");
        assert!(exporter.history().unwrap().is_empty());
    }
}
