//! Wire types for the detection service
//!
//! These mirror the service's JSON exactly and are converted into domain
//! types at the edge. Timestamps from the service are naive strings and are
//! not trusted; results are stamped locally when registered.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisResult, Detection};

/// File handed to the upload endpoint
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// `POST /upload` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    #[serde(default)]
    pub filename: String,
}

/// `GET /analysis/{id}` response, discriminated by `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisStatus {
    Processing,
    Done { result: RemoteAnalysis },
    Error {
        #[serde(default)]
        detail: Option<String>,
    },
}

/// Detection as sent by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDetection {
    pub class_name: String,
    pub confidence: f64,
    /// `[x1, y1, x2, y2]`
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Analysis payload as sent by the service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteAnalysis {
    /// Service-side analysis id; not the file id
    pub id: Option<String>,
    pub filename: Option<String>,
    pub file_type: Option<String>,
    pub image_data: Option<String>,
    pub detections: Vec<RemoteDetection>,
    pub total_objects: Option<u32>,
    pub processing_time: f64,
    pub timestamp: Option<String>,
}

impl RemoteAnalysis {
    /// Convert into a domain result keyed by the uploaded item's id
    pub fn into_result(self, item_id: &str, item_name: &str) -> AnalysisResult {
        let detections: Vec<Detection> = self
            .detections
            .into_iter()
            .map(|d| {
                let mut bbox = [0.0; 4];
                for (slot, v) in bbox.iter_mut().zip(d.bbox.iter()) {
                    *slot = *v;
                }
                Detection {
                    class_name: d.class_name,
                    confidence: d.confidence.clamp(0.0, 1.0),
                    bbox,
                    color: d.color,
                }
            })
            .collect();
        let total_objects = self.total_objects.unwrap_or(detections.len() as u32);
        AnalysisResult {
            id: item_id.to_string(),
            name: self
                .filename
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| item_name.to_string()),
            detections,
            total_objects,
            processing_time: self.processing_time,
            processed_at: Utc::now(),
            file_type: self.file_type,
            image_data: self.image_data,
        }
    }
}

/// Error body the service sends with non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_processing() {
        let status: AnalysisStatus = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(status, AnalysisStatus::Processing);
    }

    #[test]
    fn test_parse_error_with_detail() {
        let status: AnalysisStatus =
            serde_json::from_str(r#"{"status":"error","detail":"Invalid image format"}"#).unwrap();
        assert_eq!(
            status,
            AnalysisStatus::Error {
                detail: Some("Invalid image format".to_string())
            }
        );
    }

    #[test]
    fn test_parse_done_and_convert() {
        let raw = r##"{
            "status": "done",
            "result": {
                "id": "server-side-id",
                "filename": "street.jpg",
                "file_type": "image/jpeg",
                "image_data": "aGVsbG8=",
                "detections": [
                    {"id": "d1", "class_name": "car", "confidence": 0.87, "bbox": [1, 2, 30, 40], "color": "#FF6B6B"}
                ],
                "total_objects": 1,
                "processing_time": 0.42,
                "timestamp": "2024-05-01T10:00:00.123456"
            }
        }"##;
        let status: AnalysisStatus = serde_json::from_str(raw).unwrap();
        let AnalysisStatus::Done { result } = status else {
            panic!("expected done");
        };
        let converted = result.into_result("file-9", "fallback.jpg");
        assert_eq!(converted.id, "file-9");
        assert_eq!(converted.name, "street.jpg");
        assert_eq!(converted.total_objects, 1);
        assert_eq!(converted.detections[0].bbox, [1.0, 2.0, 30.0, 40.0]);
        assert_eq!(converted.image_data.as_deref(), Some("aGVsbG8="));
    }

    #[test]
    fn test_convert_short_bbox_and_missing_fields() {
        let remote = RemoteAnalysis {
            detections: vec![RemoteDetection {
                class_name: "dog".to_string(),
                confidence: 1.3,
                bbox: vec![5.0, 6.0],
                color: None,
            }],
            ..Default::default()
        };
        let converted = remote.into_result("id-1", "dog.png");
        assert_eq!(converted.name, "dog.png");
        assert_eq!(converted.total_objects, 1);
        assert_eq!(converted.detections[0].bbox, [5.0, 6.0, 0.0, 0.0]);
        assert_eq!(converted.detections[0].confidence, 1.0);
    }
}
