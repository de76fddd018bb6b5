use std::sync::Arc;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::domain::plan::{AnnotationPlan, AnnotationSummary};
use crate::detection::domain::detections::RawDetection;
use crate::detection::domain::detector::Detector;
use crate::detection::domain::face_features::{FaceFeatures, FeatureCandidates, FeatureRules};
use crate::shared::constants::FACE_INPUT_WIDTH;
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;
use crate::shared::image_codec::resize_to_width;
use crate::shared::region::Region;

/// Classifiers probed at startup. Only `face` is required.
#[derive(Clone, Default)]
pub struct FaceDetectors {
    pub face: Option<Arc<dyn Detector>>,
    pub eyes: Option<Arc<dyn Detector>>,
    pub nose: Option<Arc<dyn Detector>>,
    pub mouth: Option<Arc<dyn Detector>>,
}

#[derive(Clone, Debug)]
pub struct FaceFeaturesOutcome {
    /// The normalised input with overlays drawn on it.
    pub image: Frame,
    pub faces: Vec<FaceFeatures>,
    pub summary: AnnotationSummary,
}

impl FaceFeaturesOutcome {
    pub fn face_count(&self) -> usize {
        self.summary.primary_count
    }

    pub fn features_detected(&self) -> bool {
        self.summary.features_present
    }
}

/// Face pipeline: resize → detect faces → detect features per face →
/// filter → annotate.
pub struct DetectFaceFeaturesUseCase {
    detectors: FaceDetectors,
    rules: FeatureRules,
    annotator: Arc<dyn FrameAnnotator>,
    input_width: u32,
}

impl DetectFaceFeaturesUseCase {
    pub fn new(
        detectors: FaceDetectors,
        rules: FeatureRules,
        annotator: Arc<dyn FrameAnnotator>,
    ) -> Self {
        Self {
            detectors,
            rules,
            annotator,
            input_width: FACE_INPUT_WIDTH,
        }
    }

    pub fn with_input_width(mut self, input_width: u32) -> Self {
        self.input_width = input_width;
        self
    }

    pub fn execute(&self, image: &Frame) -> Result<FaceFeaturesOutcome, VisionError> {
        let face_detector = self
            .detectors
            .face
            .as_ref()
            .ok_or_else(|| VisionError::DetectorUnavailable("face cascade not loaded".into()))?;

        let mut frame = resize_to_width(image, self.input_width);
        let faces = face_detector.detect(&frame, None)?;
        log::debug!(
            "Detected {} face(s) in {}x{} image",
            faces.len(),
            frame.width(),
            frame.height()
        );

        let features = faces
            .into_iter()
            .map(|face| self.features_for(&frame, face))
            .collect::<Result<Vec<_>, _>>()?;

        let plan = AnnotationPlan::for_faces(&features);
        self.annotator.render(&mut frame, &plan)?;

        Ok(FaceFeaturesOutcome {
            image: frame,
            faces: features,
            summary: plan.summary,
        })
    }

    fn features_for(&self, frame: &Frame, face: RawDetection) -> Result<FaceFeatures, VisionError> {
        let roi = face.region.clip_to(&frame.bounds());
        let candidates = FeatureCandidates {
            eyes: detect_within(self.detectors.eyes.as_deref(), frame, &roi)?,
            noses: detect_within(self.detectors.nose.as_deref(), frame, &roi)?,
            mouths: detect_within(self.detectors.mouth.as_deref(), frame, &roi)?,
        };
        Ok(FaceFeatures::build(&self.rules, face, &candidates))
    }
}

/// `None` when the classifier is unavailable; boxes are relative to `roi`.
fn detect_within(
    detector: Option<&dyn Detector>,
    frame: &Frame,
    roi: &Region,
) -> Result<Option<Vec<RawDetection>>, VisionError> {
    detector.map(|d| d.detect(frame, Some(roi))).transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::annotation::domain::palette;
    use crate::annotation::domain::plan::Shape;
    use crate::detection::domain::detections::FeatureSlot;

    // ── Stubs ──

    struct StubDetector {
        label: &'static str,
        boxes: Vec<Region>,
        rois: Arc<Mutex<Vec<Option<Region>>>>,
    }

    impl StubDetector {
        fn new(label: &'static str, boxes: Vec<Region>) -> Self {
            Self {
                label,
                boxes,
                rois: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Detector for StubDetector {
        fn detect(&self, _frame: &Frame, roi: Option<&Region>) -> Result<Vec<RawDetection>, VisionError> {
            self.rois.lock().unwrap().push(roi.copied());
            Ok(self
                .boxes
                .iter()
                .map(|r| RawDetection::new(self.label, 0.9, *r))
                .collect())
        }
    }

    struct FailingDetector;

    impl Detector for FailingDetector {
        fn detect(&self, _frame: &Frame, _roi: Option<&Region>) -> Result<Vec<RawDetection>, VisionError> {
            Err(VisionError::Inference("boom".into()))
        }
    }

    /// Records plans instead of drawing, and paints one marker pixel.
    struct RecordingAnnotator {
        plans: Arc<Mutex<Vec<AnnotationPlan>>>,
    }

    impl FrameAnnotator for RecordingAnnotator {
        fn render(&self, frame: &mut Frame, plan: &AnnotationPlan) -> Result<(), VisionError> {
            self.plans.lock().unwrap().push(plan.clone());
            if !plan.is_empty() {
                frame.data_mut()[0] = 255;
            }
            Ok(())
        }
    }

    // ── Helpers ──

    fn gray_image(w: u32, h: u32) -> Frame {
        Frame::new(vec![90; (w * h * 3) as usize], w, h, 0)
    }

    fn use_case(detectors: FaceDetectors) -> (DetectFaceFeaturesUseCase, Arc<Mutex<Vec<AnnotationPlan>>>) {
        let plans = Arc::new(Mutex::new(Vec::new()));
        let annotator = RecordingAnnotator {
            plans: Arc::clone(&plans),
        };
        let uc = DetectFaceFeaturesUseCase::new(detectors, FeatureRules::default(), Arc::new(annotator));
        (uc, plans)
    }

    fn face_only(boxes: Vec<Region>) -> FaceDetectors {
        FaceDetectors {
            face: Some(Arc::new(StubDetector::new("face", boxes))),
            ..FaceDetectors::default()
        }
    }

    // ── Tests ──

    #[test]
    fn test_no_faces_leaves_resized_image_untouched() {
        let (uc, plans) = use_case(face_only(vec![]));
        let input = Frame::new((0..1280 * 720 * 3).map(|i| (i % 253) as u8).collect(), 1280, 720, 0);
        let outcome = uc.execute(&input).unwrap();

        assert_eq!(outcome.face_count(), 0);
        assert!(!outcome.features_detected());
        assert_eq!((outcome.image.width(), outcome.image.height()), (640, 360));
        assert_eq!(outcome.image, resize_to_width(&input, 640));
        assert!(plans.lock().unwrap()[0].is_empty());
    }

    #[test]
    fn test_one_face_produces_legend_and_features() {
        let face = Region::new(200, 100, 150, 150);
        let eyes = StubDetector::new(
            "eye",
            vec![Region::new(80, 30, 25, 25), Region::new(20, 35, 25, 25), Region::new(50, 100, 25, 25)],
        );
        let eye_rois = Arc::clone(&eyes.rois);
        let detectors = FaceDetectors {
            face: Some(Arc::new(StubDetector::new("face", vec![face]))),
            eyes: Some(Arc::new(eyes)),
            nose: None,
            mouth: Some(Arc::new(StubDetector::new("mouth", vec![Region::new(40, 110, 50, 25)]))),
        };
        let (uc, plans) = use_case(detectors);
        let outcome = uc.execute(&gray_image(640, 480)).unwrap();

        assert_eq!(outcome.face_count(), 1);
        assert!(outcome.features_detected());
        assert_eq!(*eye_rois.lock().unwrap(), vec![Some(face)]);

        let features = &outcome.faces[0];
        assert_eq!(features.eyes.len(), 2);
        assert_eq!(features.eyes[0].slot, FeatureSlot::EyeRight);
        assert_eq!(features.eyes[1].region(), Region::new(220, 135, 25, 25));
        assert!(features.nose.synthesized);
        assert_eq!(features.nose.region(), Region::new(260, 160, 30, 30));
        assert!(features.mouth.is_some());

        let plan = &plans.lock().unwrap()[0];
        assert!(matches!(plan.shapes[0], Shape::Blend { color: palette::PANEL, .. }));
        assert_eq!(outcome.image.data()[0], 255);
    }

    #[test]
    fn test_two_faces_each_get_features() {
        let detectors = face_only(vec![Region::new(10, 150, 150, 150), Region::new(300, 150, 150, 150)]);
        let (uc, _) = use_case(detectors);
        let outcome = uc.execute(&gray_image(640, 480)).unwrap();
        assert_eq!(outcome.face_count(), 2);
        assert!(outcome.faces.iter().all(|f| f.eyes.is_empty() && f.mouth.is_none()));
        assert!(outcome.faces.iter().all(|f| f.nose.synthesized));
    }

    #[test]
    fn test_missing_face_detector_is_unavailable() {
        let (uc, plans) = use_case(FaceDetectors::default());
        let err = uc.execute(&gray_image(640, 480)).unwrap_err();
        assert!(matches!(err, VisionError::DetectorUnavailable(_)));
        assert!(plans.lock().unwrap().is_empty());
    }

    #[test]
    fn test_feature_detector_failure_propagates() {
        let detectors = FaceDetectors {
            face: Some(Arc::new(StubDetector::new("face", vec![Region::new(100, 100, 120, 120)]))),
            eyes: Some(Arc::new(FailingDetector)),
            ..FaceDetectors::default()
        };
        let (uc, _) = use_case(detectors);
        assert!(matches!(
            uc.execute(&gray_image(640, 480)),
            Err(VisionError::Inference(_))
        ));
    }

    #[test]
    fn test_small_images_are_upscaled_to_input_width() {
        let (uc, _) = use_case(face_only(vec![]));
        let outcome = uc.execute(&gray_image(320, 100)).unwrap();
        assert_eq!((outcome.image.width(), outcome.image.height()), (640, 200));
    }

    #[test]
    fn test_custom_input_width() {
        let (uc, _) = use_case(face_only(vec![]));
        let outcome = uc.with_input_width(320).execute(&gray_image(640, 480)).unwrap();
        assert_eq!((outcome.image.width(), outcome.image.height()), (320, 240));
    }
}
