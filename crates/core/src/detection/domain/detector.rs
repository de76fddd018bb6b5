use crate::detection::domain::detections::RawDetection;
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface over an external detection capability.
///
/// Implementations hold only a loaded model handle, so they are shared
/// across request threads; a model that needs exclusive access guards it
/// internally. When `roi` is given, only that part of the frame is searched
/// and returned boxes are relative to the ROI's top-left corner.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &Frame, roi: Option<&Region>) -> Result<Vec<RawDetection>, VisionError>;
}
