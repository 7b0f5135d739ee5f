//! VisionFlow configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api.base-url`
pub const BACKEND_URL_ENV: &str = "VISIONFLOW_BACKEND_URL";

/// Main VisionFlow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Detection service connection
    pub api: ApiConfig,

    /// Poll loop budget
    pub analysis: AnalysisConfig,

    /// Local slot storage
    pub storage: StorageConfig,

    /// Notification expiry
    pub notifications: NotificationsConfig,

    /// Upload queue behavior
    pub upload: UploadConfig,

    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain, then apply env overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .visionflow.yml
        let local_config = PathBuf::from(".visionflow.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/visionflow/visionflow.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("visionflow").join("visionflow.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV)
            && !url.trim().is_empty()
        {
            tracing::debug!(%url, "apply_env_overrides: backend url from environment");
            self.api.base_url = url;
        }
    }

    /// Read just the log level, before logging is set up
    ///
    /// Errors are swallowed: a broken config file is reported later by
    /// `load`, once there is somewhere to report it.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load_file_chain(config_path).ok().and_then(|c| c.log_level)
    }
}

/// Detection service connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Service base URL; `/api` is appended unless already present
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Timeout for a single status poll in milliseconds
    #[serde(rename = "poll-timeout-ms")]
    pub poll_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
            poll_timeout_ms: 10_000,
        }
    }
}

/// Poll loop budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Delay between status polls in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Maximum status polls before giving up
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            max_attempts: 100,
        }
    }
}

impl AnalysisConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Local slot storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the slot files
    pub path: PathBuf,

    /// Total byte quota across all slots
    #[serde(rename = "quota-bytes")]
    pub quota_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/visionflow on Linux)
        let path = dirs::data_dir()
            .map(|d| d.join("visionflow").join("slots"))
            .unwrap_or_else(|| PathBuf::from(".visionflow"));

        Self {
            path,
            quota_bytes: slotstore::DEFAULT_QUOTA_BYTES,
        }
    }
}

/// Notification expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    #[serde(rename = "ttl-ms")]
    pub ttl_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { ttl_ms: 5_000 }
    }
}

impl NotificationsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Upload queue behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// How long a finished entry stays in the queue
    #[serde(rename = "ready-linger-ms")]
    pub ready_linger_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { ready_linger_ms: 2_000 }
    }
}

impl UploadConfig {
    pub fn ready_linger(&self) -> Duration {
        Duration::from_millis(self.ready_linger_ms)
    }
}
