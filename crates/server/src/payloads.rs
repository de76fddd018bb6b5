use serde::{Deserialize, Serialize};

use visionx_core::detection::domain::object_filter::ObjectDetection;

#[derive(Deserialize)]
pub struct ImageRequest {
    pub image: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct FaceResponse {
    pub success: bool,
    pub result_image: String,
    pub face_count: usize,
    pub features_detected: bool,
}

#[derive(Serialize)]
pub struct ObjectResponse {
    pub success: bool,
    pub result_image: String,
    pub object_count: usize,
    pub detected_objects: Vec<String>,
    pub detections: Vec<DetectionPayload>,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct DetectionPayload {
    pub label: String,
    pub confidence: f64,
    #[serde(rename = "box")]
    pub bbox: [i32; 4],
}

impl From<&ObjectDetection> for DetectionPayload {
    fn from(obj: &ObjectDetection) -> Self {
        let (x1, y1, x2, y2) = obj.region().corners();
        Self {
            label: obj.display_label(),
            confidence: (obj.confidence() * 100.0).round() / 100.0,
            bbox: [x1, y1, x2, y2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visionx_core::detection::domain::detections::RawDetection;
    use visionx_core::detection::domain::object_filter::ObjectFilter;
    use visionx_core::shared::region::Region;

    #[test]
    fn test_detection_payload_shape() {
        let objects = ObjectFilter::default().filter(vec![RawDetection::new(
            "dog",
            0.876,
            Region::from_corners(50, 100, 150, 200),
        )]);
        let payload = DetectionPayload::from(&objects[0]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"label": "Dog", "confidence": 0.88, "box": [50, 100, 150, 200]})
        );
    }

    #[test]
    fn test_missing_image_field_parses_as_none() {
        let req: ImageRequest = serde_json::from_str("{}").unwrap();
        assert!(req.image.is_none());
    }
}
