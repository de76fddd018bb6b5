use crate::shared::region::Region;

/// A candidate produced by a detector, before any acceptance rules.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub label: String,
    confidence: f64,
    pub region: Region,
}

impl RawDetection {
    /// Confidence is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(label: impl Into<String>, confidence: f64, region: Region) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            confidence,
            region,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

/// Which part of the annotation a filtered detection fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureSlot {
    Face,
    EyeLeft,
    EyeRight,
    Nose,
    Mouth,
    EarLeft,
    EarRight,
}

/// A detection that passed the heuristic filter, in image coordinates.
///
/// `synthesized` marks boxes placed from fixed face proportions rather
/// than observed by a classifier (ears always, nose as a fallback).
#[derive(Clone, Debug, PartialEq)]
pub struct FilteredDetection {
    pub slot: FeatureSlot,
    pub detection: RawDetection,
    pub synthesized: bool,
}

impl FilteredDetection {
    pub fn observed(slot: FeatureSlot, detection: RawDetection) -> Self {
        Self {
            slot,
            detection,
            synthesized: false,
        }
    }

    pub fn synthesized(slot: FeatureSlot, label: &str, region: Region) -> Self {
        Self {
            slot,
            detection: RawDetection::new(label, 1.0, region),
            synthesized: true,
        }
    }

    pub fn region(&self) -> Region {
        self.detection.region
    }
}
