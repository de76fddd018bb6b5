use crate::capture::domain::frame_source::{CameraOpener, FrameSource};
use crate::shared::error::VisionError;

/// Opener used when the binary is built without a camera backend.
pub struct UnavailableCamera;

impl CameraOpener for UnavailableCamera {
    fn open(&self) -> Result<Box<dyn FrameSource>, VisionError> {
        Err(VisionError::CaptureUnavailable(
            "no camera backend compiled in".into(),
        ))
    }
}
