use crate::annotation::domain::plan::AnnotationPlan;
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;

/// Domain interface for drawing an [`AnnotationPlan`] onto a frame.
///
/// Implementations modify the frame in-place and only ever add marks;
/// the frame keeps its dimensions.
pub trait FrameAnnotator: Send + Sync {
    fn render(&self, frame: &mut Frame, plan: &AnnotationPlan) -> Result<(), VisionError>;
}
