//! AnalysisResult domain type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Settings;

/// One recognized object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label, e.g. "person"
    pub class_name: String,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Bounding box `[x1, y1, x2, y2]`
    pub bbox: [f64; 4],

    /// Display color assigned by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Detections for one item, keyed by the item's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Same id as the UploadItem this result augments
    pub id: String,

    pub name: String,

    /// Ordered as returned by the service
    #[serde(default)]
    pub detections: Vec<Detection>,

    pub total_objects: u32,

    /// Server-side processing duration in seconds
    #[serde(default)]
    pub processing_time: f64,

    pub processed_at: DateTime<Utc>,

    /// MIME type reported by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    /// Annotated image as base64; held in memory only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

impl AnalysisResult {
    /// Detections passing the confidence threshold and class filter
    ///
    /// An empty class filter admits every class.
    pub fn filtered<'a>(&'a self, settings: &Settings) -> Vec<&'a Detection> {
        self.detections
            .iter()
            .filter(|d| d.confidence >= settings.confidence_threshold)
            .filter(|d| settings.enabled_classes.is_empty() || settings.enabled_classes.contains(&d.class_name))
            .collect()
    }

    /// Count of detections per class, most frequent first
    pub fn class_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for detection in &self.detections {
            match counts.iter_mut().find(|(name, _)| *name == detection.class_name) {
                Some((_, n)) => *n += 1,
                None => counts.push((detection.class_name.clone(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts
    }
}
