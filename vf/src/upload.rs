//! UploadQueueManager - validates files and drives them through upload
//!
//! Each submission gets a local queue entry that tracks it from `uploading`
//! to `ready` or `error`. Only a successful upload registers an item in the
//! state store; a failed one leaves nothing behind but its queue entry and a
//! notification.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, DetectionApi, MediaUpload};
use crate::domain::{ItemStatus, MediaKind, Settings, UploadItem, media_type_for, queue_entry_id};
use crate::notify::NotificationCenter;
use crate::state::{Action, StateError, StateStore};

/// Errors from submitting or removing media
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("{name} exceeds the maximum file size of {limit_mb} MB")]
    TooLarge { name: String, size: u64, limit_mb: u64 },

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl UploadError {
    /// Rejected before any network call
    pub fn is_validation(&self) -> bool {
        matches!(self, UploadError::UnsupportedFormat(_) | UploadError::TooLarge { .. })
    }
}

/// A raw file handed in for upload
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a file from disk, keeping only its file name
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "MediaFile::read: called");
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A submission's progress in the local queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub local_id: String,
    pub name: String,
    pub size: u64,
    pub kind: MediaKind,
    pub status: ItemStatus,
    pub error: Option<String>,
    /// Server-assigned id once the upload succeeded
    pub item_id: Option<String>,
}

/// Accepts files, uploads them and registers the results
#[derive(Clone)]
pub struct UploadQueueManager {
    api: Arc<dyn DetectionApi>,
    store: StateStore,
    notifier: NotificationCenter,
    queue: Arc<Mutex<Vec<QueueEntry>>>,
    ready_linger: Duration,
}

impl UploadQueueManager {
    pub fn new(
        api: Arc<dyn DetectionApi>,
        store: StateStore,
        notifier: NotificationCenter,
        ready_linger: Duration,
    ) -> Self {
        Self {
            api,
            store,
            notifier,
            queue: Arc::new(Mutex::new(Vec::new())),
            ready_linger,
        }
    }

    /// Check a file against the format allow-list and the size limit
    pub fn validate(file: &MediaFile, settings: &Settings) -> Result<(MediaKind, &'static str), UploadError> {
        let (kind, mime) =
            media_type_for(&file.name).ok_or_else(|| UploadError::UnsupportedFormat(file.name.clone()))?;
        if file.size() > settings.max_file_size_bytes() {
            return Err(UploadError::TooLarge {
                name: file.name.clone(),
                size: file.size(),
                limit_mb: settings.max_file_size_mb,
            });
        }
        Ok((kind, mime))
    }

    /// Upload one file; returns the registered item id
    pub async fn submit(&self, file: MediaFile) -> Result<String, UploadError> {
        debug!(name = %file.name, size = file.size(), "submit: called");
        let settings = self.store.snapshot().await?.settings.clone();

        let (kind, mime) = match Self::validate(&file, &settings) {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(name = %file.name, error = %e, "submit: rejected");
                self.notifier.error(e.to_string()).await?;
                return Err(e);
            }
        };

        let local_id = queue_entry_id();
        let size = file.size();
        self.lock_queue().push(QueueEntry {
            local_id: local_id.clone(),
            name: file.name.clone(),
            size,
            kind,
            status: ItemStatus::Uploading,
            error: None,
            item_id: None,
        });

        let preview = preview_data_url(mime, &file.bytes);
        let upload = MediaUpload {
            file_name: file.name.clone(),
            mime_type: mime.to_string(),
            bytes: file.bytes,
        };

        match self.api.upload(upload).await {
            Ok(response) => {
                let item = UploadItem::ready(response.file_id.clone(), file.name.clone(), size, kind)
                    .with_preview(Some(preview));
                self.store.dispatch(Action::AddUploadedItem(item)).await?;
                self.notifier
                    .success(format!("{} uploaded successfully!", file.name))
                    .await?;
                self.update_entry(&local_id, |entry| {
                    entry.status = ItemStatus::Ready;
                    entry.item_id = Some(response.file_id.clone());
                });
                self.schedule_removal(local_id);
                info!(name = %file.name, file_id = %response.file_id, "upload completed");
                Ok(response.file_id)
            }
            Err(e) => {
                warn!(name = %file.name, error = %e, "upload failed");
                self.update_entry(&local_id, |entry| {
                    entry.status = ItemStatus::Error;
                    entry.error = Some(e.to_string());
                });
                self.notifier
                    .error(format!("Failed to upload {}: {}", file.name, e))
                    .await?;
                Err(UploadError::Api(e))
            }
        }
    }

    /// Upload several files concurrently; results are in input order
    pub async fn submit_all(&self, files: Vec<MediaFile>) -> Vec<Result<String, UploadError>> {
        debug!(count = files.len(), "submit_all: called");
        join_all(files.into_iter().map(|file| self.submit(file))).await
    }

    /// Snapshot of the local queue
    pub fn queue(&self) -> Vec<QueueEntry> {
        self.lock_queue().clone()
    }

    /// Drop an entry from the local queue
    pub fn dismiss(&self, local_id: &str) -> bool {
        let mut queue = self.lock_queue();
        let before = queue.len();
        queue.retain(|e| e.local_id != local_id);
        queue.len() != before
    }

    /// Delete an item remotely and forget it locally
    ///
    /// A 404 means the service already lost it, so the local copy goes too.
    /// Any other failure keeps the item.
    pub async fn remove_item(&self, item_id: &str) -> Result<(), UploadError> {
        debug!(%item_id, "remove_item: called");
        let snapshot = self.store.snapshot().await?;
        let name = snapshot
            .item(item_id)
            .map(|i| i.name.clone())
            .ok_or_else(|| UploadError::NotFound(item_id.to_string()))?;

        self.notifier.info(format!("Deleting {name}...")).await?;
        match self.api.delete(item_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(%item_id, "remove_item: already gone remotely");
            }
            Err(e) => {
                warn!(%item_id, error = %e, "delete failed");
                self.notifier.error(format!("Failed to delete file: {e}")).await?;
                return Err(UploadError::Api(e));
            }
        }

        self.store.dispatch(Action::RemoveItem(item_id.to_string())).await?;
        self.notifier.success(format!("{name} deleted successfully")).await?;
        info!(%item_id, "item deleted");
        Ok(())
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Vec<QueueEntry>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_entry(&self, local_id: &str, f: impl FnOnce(&mut QueueEntry)) {
        if let Some(entry) = self.lock_queue().iter_mut().find(|e| e.local_id == local_id) {
            f(entry);
        }
    }

    fn schedule_removal(&self, local_id: String) {
        let queue = self.queue.clone();
        let linger = self.ready_linger;
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|e| e.local_id != local_id);
        });
    }
}

/// Build a `data:` URL preview for a file
pub fn preview_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::mock::MockDetectionApi;
    use crate::domain::Severity;
    use crate::state::AppState;

    fn setup(api: MockDetectionApi) -> (Arc<MockDetectionApi>, StateStore, UploadQueueManager) {
        let api = Arc::new(api);
        let store = StateStore::spawn(AppState::default());
        let notifier = NotificationCenter::new(store.clone(), Duration::from_secs(60));
        let manager = UploadQueueManager::new(api.clone(), store.clone(), notifier, Duration::from_millis(30));
        (api, store, manager)
    }

    #[tokio::test]
    async fn test_unsupported_format_only_notifies() {
        let (api, store, manager) = setup(MockDetectionApi::new());
        let mut events = store.subscribe();

        let err = manager
            .submit(MediaFile::new("setup.exe", vec![0; 16]))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(api.upload_count(), 0);
        assert!(manager.queue().is_empty());

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.uploaded_items.is_empty());
        assert_eq!(snapshot.credits, 0);
        assert_eq!(snapshot.notifications.len(), 1);
        assert_eq!(snapshot.notifications[0].severity, Severity::Error);
        assert_eq!(snapshot.notifications[0].message, "Unsupported file format: setup.exe");

        // The notification is the only change
        let crate::state::StateEvent::Changed { action, .. } = events.try_recv().unwrap();
        assert_eq!(action, "ADD_NOTIFICATION");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected() {
        let (api, store, manager) = setup(MockDetectionApi::new());
        store
            .dispatch(Action::UpdateSettings(crate::domain::SettingsPatch {
                max_file_size_mb: Some(1),
                ..Default::default()
            }))
            .await
            .unwrap();

        let err = manager
            .submit(MediaFile::new("big.png", vec![0; 1024 * 1024 + 1]))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::TooLarge { limit_mb: 1, .. }));
        assert_eq!(api.upload_count(), 0);
        assert!(store.snapshot().await.unwrap().uploaded_items.is_empty());
    }

    #[tokio::test]
    async fn test_successful_upload_registers_ready_item() {
        let (_api, store, manager) = setup(MockDetectionApi::new());

        let id = manager.submit(MediaFile::new("cat.png", vec![1, 2, 3])).await.unwrap();

        let snapshot = store.snapshot().await.unwrap();
        let item = snapshot.item(&id).unwrap();
        assert_eq!(item.status, ItemStatus::Ready);
        assert_eq!(item.kind, MediaKind::Image);
        assert_eq!(item.size, 3);
        assert_eq!(item.preview.as_deref(), Some("data:image/png;base64,AQID"));
        assert_eq!(snapshot.credits, 1);
        assert_eq!(snapshot.notifications.last().unwrap().message, "cat.png uploaded successfully!");

        let queue = manager.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, ItemStatus::Ready);
        assert_eq!(queue[0].item_id.as_deref(), Some(id.as_str()));

        // Entry lingers, then disappears
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(manager.queue().is_empty());
    }

    #[tokio::test]
    async fn test_entry_is_uploading_while_request_in_flight() {
        let (api, store, manager) = setup(MockDetectionApi::new().with_upload_gate());

        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.submit(MediaFile::new("clip.mp4", vec![9; 8])).await })
        };
        while api.upload_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let queue = manager.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, ItemStatus::Uploading);
        assert_eq!(queue[0].kind, MediaKind::Video);
        assert!(store.snapshot().await.unwrap().uploaded_items.is_empty());

        api.release_uploads();
        let id = pending.await.unwrap().unwrap();
        assert_eq!(store.snapshot().await.unwrap().item(&id).unwrap().status, ItemStatus::Ready);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_no_item() {
        let (_api, store, manager) = setup(MockDetectionApi::new().with_uploads(vec![Err(ApiError::Status {
            status: 400,
            detail: "Only image files are supported".to_string(),
        })]));

        let err = manager.submit(MediaFile::new("dog.jpg", vec![1])).await.unwrap_err();
        assert!(matches!(err, UploadError::Api(_)));

        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.uploaded_items.is_empty());
        assert_eq!(snapshot.credits, 0);
        assert_eq!(
            snapshot.notifications.last().unwrap().message,
            "Failed to upload dog.jpg: Only image files are supported"
        );

        let queue = manager.queue();
        assert_eq!(queue[0].status, ItemStatus::Error);
        assert_eq!(queue[0].error.as_deref(), Some("Only image files are supported"));

        // Error entries stay until dismissed
        tokio::time::sleep(Duration::from_millis(100)).await;
        let local_id = manager.queue()[0].local_id.clone();
        assert!(manager.dismiss(&local_id));
        assert!(manager.queue().is_empty());
    }

    #[tokio::test]
    async fn test_submit_all_isolates_failures() {
        let (_api, store, manager) = setup(MockDetectionApi::new());

        let results = manager
            .submit_all(vec![
                MediaFile::new("a.png", vec![1]),
                MediaFile::new("notes.txt", vec![2]),
                MediaFile::new("b.webm", vec![3]),
            ])
            .await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(UploadError::UnsupportedFormat(_))));
        assert!(results[2].is_ok());
        let snapshot = store.snapshot().await.unwrap();
        assert_eq!(snapshot.uploaded_items.len(), 2);
        assert_eq!(snapshot.credits, 2);
    }

    #[tokio::test]
    async fn test_remove_item_deletes_remotely_and_locally() {
        let (api, store, manager) = setup(MockDetectionApi::new());
        let id = manager.submit(MediaFile::new("cat.png", vec![1])).await.unwrap();

        manager.remove_item(&id).await.unwrap();

        assert_eq!(api.delete_count(), 1);
        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.item(&id).is_none());
        assert_eq!(snapshot.notifications.last().unwrap().message, "cat.png deleted successfully");
    }

    #[tokio::test]
    async fn test_remove_item_treats_404_as_gone() {
        let (_api, store, manager) = setup(MockDetectionApi::new().with_deletes(vec![Err(ApiError::Status {
            status: 404,
            detail: "File not found".to_string(),
        })]));
        let id = manager.submit(MediaFile::new("cat.png", vec![1])).await.unwrap();

        manager.remove_item(&id).await.unwrap();
        assert!(store.snapshot().await.unwrap().item(&id).is_none());
    }

    #[tokio::test]
    async fn test_remove_item_keeps_item_on_server_error() {
        let (_api, store, manager) = setup(MockDetectionApi::new().with_deletes(vec![Err(ApiError::Status {
            status: 500,
            detail: "Failed to delete file".to_string(),
        })]));
        let id = manager.submit(MediaFile::new("cat.png", vec![1])).await.unwrap();

        assert!(manager.remove_item(&id).await.is_err());
        let snapshot = store.snapshot().await.unwrap();
        assert!(snapshot.item(&id).is_some());
        let last = snapshot.notifications.last().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.message, "Failed to delete file: Failed to delete file");
    }

    #[tokio::test]
    async fn test_media_file_read_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.jpeg");
        std::fs::write(&path, b"jpeg").unwrap();

        let file = MediaFile::read(&path).await.unwrap();
        assert_eq!(file.name, "frame.jpeg");
        assert_eq!(file.size(), 4);
    }
}
