//! App - wires the components around one state store

use std::sync::Arc;

use eyre::{Context, Result};
use slotstore::{FileSlots, SlotStorage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::analysis::{AnalysisPoller, PollConfig};
use crate::api::{DetectionApi, HttpDetectionClient};
use crate::config::Config;
use crate::domain::SettingsPatch;
use crate::export::Exporter;
use crate::notify::NotificationCenter;
use crate::persistence::PersistenceAdapter;
use crate::state::{Action, AppState, StateStore};
use crate::upload::UploadQueueManager;

/// A running VisionFlow client
pub struct App {
    pub store: StateStore,
    pub notifier: NotificationCenter,
    pub uploads: UploadQueueManager,
    pub analysis: AnalysisPoller,
    pub exporter: Exporter,
    pub persistence: PersistenceAdapter,
    api: Arc<dyn DetectionApi>,
    mirror: JoinHandle<()>,
    mirror_shutdown: CancellationToken,
}

impl App {
    /// Start against the configured service and slot directory
    pub async fn start(config: &Config) -> Result<Self> {
        debug!(base_url = %config.api.base_url, "App::start: called");
        let slots = FileSlots::open(&config.storage.path, config.storage.quota_bytes)
            .context(format!("Failed to open storage at {}", config.storage.path.display()))?;
        let api = HttpDetectionClient::from_config(&config.api).context("Failed to create API client")?;
        Self::with_parts(Arc::new(api), Arc::new(slots), config).await
    }

    /// Start with an explicit transport and storage backend
    pub async fn with_parts(api: Arc<dyn DetectionApi>, slots: Arc<dyn SlotStorage>, config: &Config) -> Result<Self> {
        let store = StateStore::spawn(AppState::default());
        let persistence = PersistenceAdapter::new(slots.clone());
        persistence
            .restore(&store)
            .await
            .context("Failed to restore persisted state")?;

        let mirror_shutdown = CancellationToken::new();
        let mirror = persistence.spawn_mirror(&store, mirror_shutdown.clone());

        let notifier = NotificationCenter::new(store.clone(), config.notifications.ttl());
        let uploads = UploadQueueManager::new(
            api.clone(),
            store.clone(),
            notifier.clone(),
            config.upload.ready_linger(),
        );
        let analysis = AnalysisPoller::new(
            api.clone(),
            store.clone(),
            notifier.clone(),
            PollConfig::from(&config.analysis),
        );
        let exporter = Exporter::new(api.clone(), store.clone(), notifier.clone(), slots);

        info!("VisionFlow client started");
        Ok(Self {
            store,
            notifier,
            uploads,
            analysis,
            exporter,
            persistence,
            api,
            mirror,
            mirror_shutdown,
        })
    }

    pub fn api(&self) -> &Arc<dyn DetectionApi> {
        &self.api
    }

    /// Merge a settings patch and confirm with a notification
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Arc<AppState>> {
        debug!(?patch, "update_settings: called");
        let snapshot = self.store.dispatch(Action::UpdateSettings(patch)).await?;
        self.notifier.success("Settings saved successfully").await?;
        Ok(snapshot)
    }

    pub async fn reset_settings(&self) -> Result<Arc<AppState>> {
        debug!("reset_settings: called");
        let snapshot = self
            .store
            .dispatch(Action::UpdateSettings(SettingsPatch::defaults()))
            .await?;
        self.notifier.info("Settings reset to defaults").await?;
        Ok(snapshot)
    }

    /// Forget every item, result, setting and export record
    pub async fn reset_all(&self) -> Result<()> {
        debug!("reset_all: called");
        self.store.dispatch(Action::ResetAll).await?;
        self.exporter.clear_history().context("Failed to clear export history")?;
        self.notifier.success("All data cleared successfully").await?;
        info!("All data cleared");
        Ok(())
    }

    /// Flush persistence and stop the store
    pub async fn shutdown(self) -> Result<()> {
        debug!("App::shutdown: called");
        self.mirror_shutdown.cancel();
        self.mirror.await.context("Persistence mirror panicked")?;
        self.store.shutdown().await?;
        info!("VisionFlow client stopped");
        Ok(())
    }
}
