use std::sync::Arc;

use tiny_http::Method;

use visionx_core::capture::infrastructure::capture_session::CaptureSession;
use visionx_core::pipeline::detect_objects_use_case::DetectObjectsUseCase;
use visionx_core::pipeline::stream_objects_use_case::{stream_content_type, StreamObjectsUseCase};
use visionx_core::shared::error::VisionError;
use visionx_core::shared::image_codec::encode_jpeg_data_uri;

use crate::payloads::{DetectionPayload, MessageResponse, ObjectResponse};
use crate::routes::{decode_image_request, failure, Reply, Service};

const OPEN_FAILED_MESSAGE: &str = "Failed to open webcam";

/// Object detection on uploads plus the webcam feed.
pub struct ObjectService {
    objects: Arc<DetectObjectsUseCase>,
    stream: StreamObjectsUseCase,
    capture: CaptureSession,
    jpeg_quality: u8,
}

impl ObjectService {
    pub fn new(objects: DetectObjectsUseCase, capture: CaptureSession, jpeg_quality: u8) -> Self {
        let objects = Arc::new(objects);
        Self {
            stream: StreamObjectsUseCase::new(Arc::clone(&objects), jpeg_quality),
            objects,
            capture,
            jpeg_quality,
        }
    }

    fn detect_objects(&self, body: &[u8]) -> Result<ObjectResponse, VisionError> {
        let image = decode_image_request(body)?;
        let outcome = self.objects.execute(image)?;
        log::debug!("Object request: {} object(s)", outcome.objects.len());
        Ok(ObjectResponse {
            success: true,
            result_image: encode_jpeg_data_uri(&outcome.image, self.jpeg_quality)?,
            object_count: outcome.objects.len(),
            detected_objects: outcome.summary.labels,
            detections: outcome.objects.iter().map(DetectionPayload::from).collect(),
        })
    }

    fn start_webcam(&self) -> MessageResponse {
        match self.capture.start() {
            Ok(()) => MessageResponse::ok("Webcam started"),
            Err(e) => capture_failure(e),
        }
    }

    fn stop_webcam(&self) -> MessageResponse {
        match self.capture.stop() {
            Ok(()) => MessageResponse::ok("Webcam stopped"),
            Err(e) => capture_failure(e),
        }
    }

    fn video_feed(&self) -> Reply<'_> {
        match self.capture.frames() {
            Ok(frames) => {
                log::debug!("Video feed client attached");
                Reply::stream(stream_content_type(), Box::new(self.stream.parts(frames)))
            }
            Err(e) => Reply::json(200, &capture_failure(e)),
        }
    }
}

/// State conflicts are reported as-is; device faults collapse to one message.
fn capture_failure(error: VisionError) -> MessageResponse {
    if error.is_state_conflict() {
        return MessageResponse::failed(error.to_string());
    }
    log::warn!("{OPEN_FAILED_MESSAGE}: {error}");
    MessageResponse::failed(OPEN_FAILED_MESSAGE)
}

impl Service for ObjectService {
    fn name(&self) -> &'static str {
        "object"
    }

    fn route<'a>(&'a self, method: &Method, path: &str, body: &[u8]) -> Option<Reply<'a>> {
        let reply = match (method, path) {
            (Method::Post, "/api/detect-objects") => match self.detect_objects(body) {
                Ok(response) => Reply::json(200, &response),
                Err(e) => failure("Object detection", &e),
            },
            (Method::Get, "/api/start-webcam") => Reply::json(200, &self.start_webcam()),
            (Method::Get, "/api/stop-webcam") => Reply::json(200, &self.stop_webcam()),
            (Method::Get, "/api/video-feed") => self.video_feed(),
            _ => return None,
        };
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    use super::*;
    use crate::routes::{handle, ReplyBody};
    use visionx_core::annotation::infrastructure::canvas_renderer::CanvasRenderer;
    use visionx_core::capture::domain::frame_source::{CameraOpener, FrameSource};
    use visionx_core::capture::infrastructure::unavailable_camera::UnavailableCamera;
    use visionx_core::detection::domain::detections::RawDetection;
    use visionx_core::detection::domain::detector::Detector;
    use visionx_core::detection::domain::object_filter::ObjectFilter;
    use visionx_core::shared::frame::Frame;
    use visionx_core::shared::region::Region;

    // ── Stubs ──

    struct StubDetector(Vec<RawDetection>);

    impl Detector for StubDetector {
        fn detect(&self, _frame: &Frame, _roi: Option<&Region>) -> Result<Vec<RawDetection>, VisionError> {
            Ok(self.0.clone())
        }
    }

    struct StubCamera;

    impl FrameSource for StubCamera {
        fn next_frame(&mut self) -> Result<Frame, VisionError> {
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(Frame::new(vec![40; 32 * 24 * 3], 32, 24, 0))
        }
    }

    struct StubOpener;

    impl CameraOpener for StubOpener {
        fn open(&self) -> Result<Box<dyn FrameSource>, VisionError> {
            Ok(Box::new(StubCamera))
        }
    }

    // ── Helpers ──

    fn service_with(detections: Vec<RawDetection>, opener: Arc<dyn CameraOpener>) -> ObjectService {
        let objects = DetectObjectsUseCase::new(
            Some(Arc::new(StubDetector(detections))),
            ObjectFilter::default(),
            Arc::new(CanvasRenderer::new(None)),
        );
        ObjectService::new(objects, CaptureSession::new(opener), 95)
    }

    fn service() -> ObjectService {
        service_with(Vec::new(), Arc::new(StubOpener))
    }

    fn request_body(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([30, 60, 90]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        serde_json::to_vec(&serde_json::json!({
            "image": format!("data:image/png;base64,{}", BASE64.encode(png))
        }))
        .unwrap()
    }

    fn get(svc: &ObjectService, path: &str) -> serde_json::Value {
        handle(svc, &Method::Get, path, b"").json_value()
    }

    // ── Upload ──

    #[test]
    fn test_dog_and_car() {
        let svc = service_with(
            vec![
                RawDetection::new("dog", 0.8, Region::from_corners(50, 100, 150, 200)),
                RawDetection::new("car", 0.9, Region::from_corners(200, 50, 400, 150)),
            ],
            Arc::new(StubOpener),
        );
        let reply = handle(&svc, &Method::Post, "/api/detect-objects", &request_body(640, 480));
        let json = reply.json_value();
        assert_eq!(json["success"], true);
        assert_eq!(json["object_count"], 1);
        assert_eq!(json["detected_objects"], serde_json::json!(["Dog"]));
        assert_eq!(
            json["detections"],
            serde_json::json!([{"label": "Dog", "confidence": 0.8, "box": [50, 100, 150, 200]}])
        );
    }

    #[test]
    fn test_bad_upload_reports_error() {
        let svc = service();
        let reply = handle(&svc, &Method::Post, "/api/detect-objects", b"{}");
        let json = reply.json_value();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("image"));
    }

    // ── Webcam ──

    #[test]
    fn test_webcam_lifecycle_messages() {
        let svc = service();
        assert_eq!(
            get(&svc, "/api/stop-webcam"),
            serde_json::json!({"success": false, "message": "Webcam not running"})
        );
        assert_eq!(
            get(&svc, "/api/start-webcam"),
            serde_json::json!({"success": true, "message": "Webcam started"})
        );
        assert_eq!(
            get(&svc, "/api/start-webcam"),
            serde_json::json!({"success": false, "message": "Webcam already running"})
        );
        assert_eq!(
            get(&svc, "/api/stop-webcam"),
            serde_json::json!({"success": true, "message": "Webcam stopped"})
        );
    }

    #[test]
    fn test_unavailable_camera_message() {
        let svc = service_with(Vec::new(), Arc::new(UnavailableCamera));
        assert_eq!(
            get(&svc, "/api/start-webcam"),
            serde_json::json!({"success": false, "message": "Failed to open webcam"})
        );
    }

    #[test]
    fn test_capture_faults_collapse_to_open_failure() {
        for error in [
            VisionError::CaptureUnavailable("device busy".into()),
            VisionError::Inference("lock poisoned".into()),
        ] {
            let reply = serde_json::to_value(capture_failure(error)).unwrap();
            assert_eq!(reply, serde_json::json!({"success": false, "message": "Failed to open webcam"}));
        }
        let conflict = serde_json::to_value(capture_failure(VisionError::StreamBusy)).unwrap();
        assert_eq!(conflict["message"], "Video feed already being streamed");
    }

    #[test]
    fn test_video_feed_requires_running_webcam() {
        assert_eq!(
            get(&service(), "/api/video-feed"),
            serde_json::json!({"success": false, "message": "Webcam not running"})
        );
    }

    #[test]
    fn test_video_feed_streams_jpeg_parts() {
        let svc = service();
        get(&svc, "/api/start-webcam");
        let reply = handle(&svc, &Method::Get, "/api/video-feed", b"");
        match reply.body {
            ReplyBody::Stream {
                content_type,
                mut parts,
            } => {
                assert_eq!(content_type, "multipart/x-mixed-replace; boundary=frame");
                let part = parts.next().unwrap();
                assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
            }
            _ => panic!("expected a stream"),
        }
        get(&svc, "/api/stop-webcam");
    }

    #[test]
    fn test_second_feed_reader_is_refused() {
        let svc = service();
        get(&svc, "/api/start-webcam");
        let first = handle(&svc, &Method::Get, "/api/video-feed", b"");
        assert!(matches!(first.body, ReplyBody::Stream { .. }));
        let second = get(&svc, "/api/video-feed");
        assert_eq!(second["message"], "Video feed already being streamed");
        drop(first);
        get(&svc, "/api/stop-webcam");
    }
}
