use crate::detection::domain::detections::RawDetection;
use crate::shared::region::Region;

/// Object classes reported to clients, lower-case.
pub const ALLOWED_LABELS: &[&str] = &["person", "cat", "dog"];

pub const MIN_CONFIDENCE: f64 = 0.4;

/// A detected object kept by [`ObjectFilter`], label normalised to lower-case.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDetection {
    pub detection: RawDetection,
}

impl ObjectDetection {
    pub fn label(&self) -> &str {
        &self.detection.label
    }

    /// Label with its first letter upper-cased, e.g. `"Dog"`.
    pub fn display_label(&self) -> String {
        capitalize(&self.detection.label)
    }

    pub fn confidence(&self) -> f64 {
        self.detection.confidence()
    }

    pub fn region(&self) -> Region {
        self.detection.region
    }
}

/// Keeps allowed classes above a confidence floor, in detector order.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectFilter {
    pub allowed_labels: Vec<String>,
    pub min_confidence: f64,
}

impl Default for ObjectFilter {
    fn default() -> Self {
        Self {
            allowed_labels: ALLOWED_LABELS.iter().map(|s| s.to_string()).collect(),
            min_confidence: MIN_CONFIDENCE,
        }
    }
}

impl ObjectFilter {
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn filter(&self, raw: Vec<RawDetection>) -> Vec<ObjectDetection> {
        raw.into_iter()
            .filter_map(|det| {
                let label = det.label.to_lowercase();
                let allowed = self.allowed_labels.iter().any(|l| *l == label);
                if !allowed || det.confidence() < self.min_confidence {
                    return None;
                }
                Some(ObjectDetection {
                    detection: RawDetection::new(label, det.confidence(), det.region),
                })
            })
            .collect()
    }
}

pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
