use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use crate::capture::domain::frame_source::{CameraOpener, CameraSettings, FrameSource};
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;

/// Opens a native webcam through `nokhwa`.
pub struct NokhwaCameraOpener {
    settings: CameraSettings,
}

impl NokhwaCameraOpener {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings }
    }
}

impl CameraOpener for NokhwaCameraOpener {
    fn open(&self) -> Result<Box<dyn FrameSource>, VisionError> {
        let CameraSettings {
            device_index,
            width,
            height,
        } = self.settings;
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

        log::debug!("Opening webcam device {device_index} at {width}x{height}");
        let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
            .map_err(|e| VisionError::CaptureUnavailable(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| VisionError::CaptureUnavailable(e.to_string()))?;

        if let Err(e) = camera.set_resolution(Resolution::new(width, height)) {
            log::warn!("Could not set resolution {width}x{height}: {e}. Using camera default.");
        }
        let actual = camera.resolution();
        log::info!(
            "Webcam device {device_index} opened: {}x{}",
            actual.width(),
            actual.height()
        );

        Ok(Box::new(NokhwaFrameSource {
            camera,
            device_index,
            next_index: 0,
        }))
    }
}

struct NokhwaFrameSource {
    camera: Camera,
    device_index: u32,
    next_index: usize,
}

impl FrameSource for NokhwaFrameSource {
    fn next_frame(&mut self) -> Result<Frame, VisionError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| VisionError::CaptureUnavailable(e.to_string()))?;
        let resolution = buffer.resolution();
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| VisionError::Decode(e.to_string()))?;
        let data = decoded.into_raw();

        let expected = resolution.width() as usize * resolution.height() as usize * 3;
        if data.len() != expected {
            return Err(VisionError::Decode(format!(
                "webcam frame has {} bytes, expected {expected}",
                data.len()
            )));
        }

        let frame = Frame::new(data, resolution.width(), resolution.height(), self.next_index);
        self.next_index += 1;
        Ok(frame)
    }
}

impl Drop for NokhwaFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Failed to stop webcam stream: {e}");
        }
        log::info!("Webcam device {} released", self.device_index);
    }
}
