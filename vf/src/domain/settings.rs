//! Settings domain type
//!
//! A flat, always fully defined record. Changes arrive as a [`SettingsPatch`]
//! and are shallow-merged, so a partially specified update can never leave a
//! field undefined.

use serde::{Deserialize, Serialize};

/// The 80 COCO classes the detection model knows
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake",
    "chair", "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop",
    "mouse", "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// Export payload format offered by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Yolo,
    Coco,
    Voc,
    #[default]
    Json,
}

impl ExportFormat {
    /// Query-string value for the export endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yolo => "yolo",
            Self::Coco => "coco",
            Self::Voc => "voc",
            Self::Json => "json",
        }
    }

    /// File extension of the downloaded payload: a document for json, an archive otherwise
    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            _ => "zip",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yolo" => Ok(Self::Yolo),
            "coco" => Ok(Self::Coco),
            "voc" => Ok(Self::Voc),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{other}' (expected yolo, coco, voc or json)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!("unknown theme '{other}' (expected dark or light)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl std::str::FromStr for ProcessingQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown quality '{other}' (expected low, medium or high)")),
        }
    }
}

/// User preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Minimum confidence for a detection to be shown, in [0, 1]
    pub confidence_threshold: f64,

    /// Classes to show; empty shows every class
    pub enabled_classes: Vec<String>,

    pub export_format: ExportFormat,

    pub theme: Theme,

    /// Upload size limit in megabytes
    #[serde(rename = "maxFileSize")]
    pub max_file_size_mb: u64,

    pub processing_quality: ProcessingQuality,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            enabled_classes: COCO_CLASSES.iter().map(|c| c.to_string()).collect(),
            export_format: ExportFormat::Json,
            theme: Theme::Dark,
            max_file_size_mb: 50,
            processing_quality: ProcessingQuality::High,
        }
    }
}

impl Settings {
    /// Upload size limit in bytes
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Shallow-merge a patch; fields absent from the patch keep their value
    pub fn merged(&self, patch: SettingsPatch) -> Settings {
        Settings {
            confidence_threshold: patch
                .confidence_threshold
                .map(|c| if c.is_nan() { self.confidence_threshold } else { c.clamp(0.0, 1.0) })
                .unwrap_or(self.confidence_threshold),
            enabled_classes: patch.enabled_classes.unwrap_or_else(|| self.enabled_classes.clone()),
            export_format: patch.export_format.unwrap_or(self.export_format),
            theme: patch.theme.unwrap_or(self.theme),
            max_file_size_mb: patch.max_file_size_mb.unwrap_or(self.max_file_size_mb),
            processing_quality: patch.processing_quality.unwrap_or(self.processing_quality),
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    pub confidence_threshold: Option<f64>,
    pub enabled_classes: Option<Vec<String>>,
    pub export_format: Option<ExportFormat>,
    pub theme: Option<Theme>,
    #[serde(rename = "maxFileSize")]
    pub max_file_size_mb: Option<u64>,
    pub processing_quality: Option<ProcessingQuality>,
}

impl SettingsPatch {
    /// A patch that sets every field, restoring the defaults
    pub fn defaults() -> Self {
        let d = Settings::default();
        Self {
            confidence_threshold: Some(d.confidence_threshold),
            enabled_classes: Some(d.enabled_classes),
            export_format: Some(d.export_format),
            theme: Some(d.theme),
            max_file_size_mb: Some(d.max_file_size_mb),
            processing_quality: Some(d.processing_quality),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
