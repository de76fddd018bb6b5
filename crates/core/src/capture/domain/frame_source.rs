use crate::shared::error::VisionError;
use crate::shared::frame::Frame;

/// An opened camera device yielding RGB frames.
///
/// Dropping the source releases the device.
pub trait FrameSource {
    /// Blocks until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame, VisionError>;
}

/// Opens camera devices on demand.
///
/// `open` runs on the capture thread, so the returned source does not need
/// to be `Send`.
pub trait CameraOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>, VisionError>;
}

/// Device selection for camera-backed openers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
        }
    }
}
