use std::path::{Path, PathBuf};

use crate::detection::domain::detections::RawDetection;
use crate::detection::domain::detector::Detector;
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::cascade_loader::load_cascade;
use super::haar_cascade::{CascadeParams, HaarCascade};

/// Haar cascade classifier exposed through the [`Detector`] interface.
///
/// Confidence is derived from the number of merged neighbour windows.
pub struct CascadeDetector {
    label: String,
    cascade: HaarCascade,
    params: CascadeParams,
}

impl CascadeDetector {
    pub fn new(label: impl Into<String>, cascade: HaarCascade, params: CascadeParams) -> Self {
        Self {
            label: label.into(),
            cascade,
            params,
        }
    }

    pub fn from_file(
        path: &Path,
        label: impl Into<String>,
        params: CascadeParams,
    ) -> Result<Self, VisionError> {
        Ok(Self::new(label, load_cascade(path)?, params))
    }

    /// Loads a cascade, logging and swallowing any failure.
    pub fn try_load(path: &Path, label: &str, params: CascadeParams) -> Option<Self> {
        match Self::from_file(path, label, params) {
            Ok(detector) => {
                log::info!("Loaded {label} cascade from {}", path.display());
                Some(detector)
            }
            Err(e) => {
                log::debug!("Could not load {label} cascade: {e}");
                None
            }
        }
    }

    /// First candidate path that loads successfully.
    pub fn first_available(candidates: &[PathBuf], label: &str, params: CascadeParams) -> Option<Self> {
        let found = candidates
            .iter()
            .find_map(|path| Self::try_load(path, label, params));
        if found.is_none() {
            log::warn!(
                "No {label} cascade found among {} candidate(s)",
                candidates.len()
            );
        }
        found
    }
}

impl Detector for CascadeDetector {
    fn detect(&self, frame: &Frame, roi: Option<&Region>) -> Result<Vec<RawDetection>, VisionError> {
        let search = roi.copied().unwrap_or_else(|| frame.bounds());
        let Some(gray) = frame.gray_crop(&search) else {
            return Ok(Vec::new());
        };
        let hits = self.cascade.detect_multi_scale(&gray, &self.params)?;
        Ok(hits
            .into_iter()
            .map(|(region, neighbors)| {
                RawDetection::new(self.label.clone(), self.params.confidence(neighbors), region)
            })
            .collect())
    }
}
