use tiny_http::Method;

use visionx_core::pipeline::detect_face_features_use_case::DetectFaceFeaturesUseCase;
use visionx_core::shared::error::VisionError;
use visionx_core::shared::image_codec::encode_jpeg_data_uri;

use crate::payloads::FaceResponse;
use crate::routes::{decode_image_request, failure, Reply, Service};

/// `POST /api/detect-faces`
pub struct FaceService {
    use_case: DetectFaceFeaturesUseCase,
    jpeg_quality: u8,
}

impl FaceService {
    pub fn new(use_case: DetectFaceFeaturesUseCase, jpeg_quality: u8) -> Self {
        Self {
            use_case,
            jpeg_quality,
        }
    }

    fn detect_faces(&self, body: &[u8]) -> Result<FaceResponse, VisionError> {
        let image = decode_image_request(body)?;
        let outcome = self.use_case.execute(&image)?;
        log::debug!("Face request: {} face(s)", outcome.face_count());
        Ok(FaceResponse {
            success: true,
            result_image: encode_jpeg_data_uri(&outcome.image, self.jpeg_quality)?,
            face_count: outcome.face_count(),
            features_detected: outcome.features_detected(),
        })
    }
}

impl Service for FaceService {
    fn name(&self) -> &'static str {
        "face"
    }

    fn route<'a>(&'a self, method: &Method, path: &str, body: &[u8]) -> Option<Reply<'a>> {
        match (method, path) {
            (Method::Post, "/api/detect-faces") => Some(match self.detect_faces(body) {
                Ok(response) => Reply::json(200, &response),
                Err(e) => failure("Face detection", &e),
            }),
            _ => None,
        }
    }
}
