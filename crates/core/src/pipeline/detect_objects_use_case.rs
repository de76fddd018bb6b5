use std::sync::Arc;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::domain::plan::{AnnotationPlan, AnnotationSummary};
use crate::detection::domain::detector::Detector;
use crate::detection::domain::object_filter::{ObjectDetection, ObjectFilter};
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;

#[derive(Clone, Debug)]
pub struct ObjectsOutcome {
    pub image: Frame,
    pub objects: Vec<ObjectDetection>,
    pub summary: AnnotationSummary,
}

/// Object pipeline at the input's own resolution: detect → filter → annotate.
pub struct DetectObjectsUseCase {
    detector: Option<Arc<dyn Detector>>,
    filter: ObjectFilter,
    annotator: Arc<dyn FrameAnnotator>,
}

impl DetectObjectsUseCase {
    pub fn new(
        detector: Option<Arc<dyn Detector>>,
        filter: ObjectFilter,
        annotator: Arc<dyn FrameAnnotator>,
    ) -> Self {
        Self {
            detector,
            filter,
            annotator,
        }
    }

    pub fn execute(&self, mut image: Frame) -> Result<ObjectsOutcome, VisionError> {
        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| VisionError::DetectorUnavailable("object model not loaded".into()))?;

        let raw = detector.detect(&image, None)?;
        let raw_count = raw.len();
        let objects = self.filter.filter(raw);
        log::debug!(
            "Frame {}: kept {} of {} object detection(s)",
            image.index(),
            objects.len(),
            raw_count
        );

        let plan = AnnotationPlan::for_objects(&objects);
        self.annotator.render(&mut image, &plan)?;

        Ok(ObjectsOutcome {
            image,
            objects,
            summary: plan.summary,
        })
    }
}
