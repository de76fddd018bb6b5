use crate::detection::domain::detections::{FeatureSlot, FilteredDetection, RawDetection};
use crate::shared::region::Region;

/// Eyes must start above this fraction of the face height.
pub const EYE_MAX_Y_FRACTION: f64 = 0.5;

pub const MAX_EYES: usize = 2;

/// Nose candidates must start strictly inside this vertical band.
pub const NOSE_MIN_Y_FRACTION: f64 = 0.3;
pub const NOSE_MAX_Y_FRACTION: f64 = 0.7;

/// Fallback nose: `(w/2 - offset, h * y_fraction, size, size)`.
pub const NOSE_FALLBACK_OFFSET_X: i32 = 15;
pub const NOSE_FALLBACK_Y_FRACTION: f64 = 0.4;
pub const NOSE_FALLBACK_SIZE: i32 = 30;

/// Mouth candidates must start below this fraction of the face height.
pub const MOUTH_MIN_Y_FRACTION: f64 = 0.5;

pub const EAR_WIDTH_FRACTION: f64 = 0.15;
pub const EAR_HEIGHT_FRACTION: f64 = 0.25;
pub const EAR_Y_FRACTION: f64 = 0.35;
/// How far an ear may hang past the face edge, in pixels.
pub const EAR_EDGE_OVERHANG: i32 = 5;

/// Positional acceptance rules for features found inside a face box.
///
/// All candidate boxes handed to these rules are relative to the face box;
/// accepted boxes come back in image coordinates and may overhang the face.
/// Drawing clips them to the face box.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRules {
    pub eye_max_y_fraction: f64,
    pub max_eyes: usize,
    pub nose_min_y_fraction: f64,
    pub nose_max_y_fraction: f64,
    pub nose_fallback_offset_x: i32,
    pub nose_fallback_y_fraction: f64,
    pub nose_fallback_size: i32,
    pub mouth_min_y_fraction: f64,
    pub ear_width_fraction: f64,
    pub ear_height_fraction: f64,
    pub ear_y_fraction: f64,
    pub ear_edge_overhang: i32,
}

impl Default for FeatureRules {
    fn default() -> Self {
        Self {
            eye_max_y_fraction: EYE_MAX_Y_FRACTION,
            max_eyes: MAX_EYES,
            nose_min_y_fraction: NOSE_MIN_Y_FRACTION,
            nose_max_y_fraction: NOSE_MAX_Y_FRACTION,
            nose_fallback_offset_x: NOSE_FALLBACK_OFFSET_X,
            nose_fallback_y_fraction: NOSE_FALLBACK_Y_FRACTION,
            nose_fallback_size: NOSE_FALLBACK_SIZE,
            mouth_min_y_fraction: MOUTH_MIN_Y_FRACTION,
            ear_width_fraction: EAR_WIDTH_FRACTION,
            ear_height_fraction: EAR_HEIGHT_FRACTION,
            ear_y_fraction: EAR_Y_FRACTION,
            ear_edge_overhang: EAR_EDGE_OVERHANG,
        }
    }
}

impl FeatureRules {
    /// Keeps the first `max_eyes` candidates in the upper part of the face.
    ///
    /// The accepted eye further left in the image fills `EyeLeft`. A lone eye
    /// is assigned by which half of the face it sits in.
    pub fn accept_eyes(&self, candidates: &[RawDetection], face: &Region) -> Vec<FilteredDetection> {
        let limit = fraction_of(face.height, self.eye_max_y_fraction);
        let accepted: Vec<&RawDetection> = candidates
            .iter()
            .filter(|c| c.region.y < limit)
            .take(self.max_eyes)
            .collect();

        let center_x = |r: &Region| r.x * 2 + r.width;
        let left_index = match accepted.as_slice() {
            [only] => {
                if center_x(&only.region) < face.width {
                    Some(0)
                } else {
                    None
                }
            }
            [first, second, ..] => {
                if center_x(&second.region) < center_x(&first.region) {
                    Some(1)
                } else {
                    Some(0)
                }
            }
            [] => None,
        };

        accepted
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let slot = if Some(i) == left_index {
                    FeatureSlot::EyeLeft
                } else {
                    FeatureSlot::EyeRight
                };
                FilteredDetection::observed(slot, to_image_space(c, face))
            })
            .collect()
    }

    /// First candidate inside the nose band, or a synthesised box.
    ///
    /// `candidates` is `None` when no nose classifier is available; that
    /// case falls back exactly like an empty candidate list.
    pub fn select_nose(&self, candidates: Option<&[RawDetection]>, face: &Region) -> FilteredDetection {
        let min_y = face.height as f64 * self.nose_min_y_fraction;
        let max_y = face.height as f64 * self.nose_max_y_fraction;
        candidates
            .unwrap_or_default()
            .iter()
            .find(|c| {
                let y = c.region.y as f64;
                min_y < y && y < max_y
            })
            .map(|c| FilteredDetection::observed(FeatureSlot::Nose, to_image_space(c, face)))
            .unwrap_or_else(|| {
                let fallback = self.nose_fallback(face).relative_to(face);
                FilteredDetection::synthesized(FeatureSlot::Nose, "nose", fallback)
            })
    }

    /// Fallback nose box relative to the face.
    pub fn nose_fallback(&self, face: &Region) -> Region {
        Region::new(
            face.width / 2 - self.nose_fallback_offset_x,
            fraction_of(face.height, self.nose_fallback_y_fraction),
            self.nose_fallback_size,
            self.nose_fallback_size,
        )
    }

    /// First candidate starting in the lower part of the face.
    pub fn select_mouth(&self, candidates: &[RawDetection], face: &Region) -> Option<FilteredDetection> {
        let min_y = face.height as f64 * self.mouth_min_y_fraction;
        candidates
            .iter()
            .find(|c| c.region.y as f64 > min_y)
            .map(|c| FilteredDetection::observed(FeatureSlot::Mouth, to_image_space(c, face)))
    }

    /// Ears are never detected; both are placed from face proportions.
    pub fn synthesize_ears(&self, face: &Region) -> [FilteredDetection; 2] {
        let [left, right] = self.ear_boxes(face);
        [
            FilteredDetection::synthesized(FeatureSlot::EarLeft, "ear", left.relative_to(face)),
            FilteredDetection::synthesized(FeatureSlot::EarRight, "ear", right.relative_to(face)),
        ]
    }

    /// Unclipped ear boxes relative to the face.
    pub fn ear_boxes(&self, face: &Region) -> [Region; 2] {
        let ear_w = fraction_of(face.width, self.ear_width_fraction);
        let ear_h = fraction_of(face.height, self.ear_height_fraction);
        let top = fraction_of(face.height, self.ear_y_fraction);
        let half_w = ear_w / 2;
        let left_x = (-self.ear_edge_overhang).max((-ear_w).div_euclid(2));
        let right_x = (face.width - half_w).min(face.width - self.ear_edge_overhang);
        [
            Region::new(left_x, top, ear_w, ear_h),
            Region::new(right_x, top, ear_w, ear_h),
        ]
    }
}

/// Every filtered feature of one face, in drawing order.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceFeatures {
    pub face: FilteredDetection,
    pub eyes: Vec<FilteredDetection>,
    pub nose: FilteredDetection,
    pub mouth: Option<FilteredDetection>,
    pub ears: [FilteredDetection; 2],
}

/// Raw per-face candidates, each `None` when its classifier is unavailable.
#[derive(Clone, Debug, Default)]
pub struct FeatureCandidates {
    pub eyes: Option<Vec<RawDetection>>,
    pub noses: Option<Vec<RawDetection>>,
    pub mouths: Option<Vec<RawDetection>>,
}

impl FaceFeatures {
    /// Applies `rules` to the candidates found inside `face`.
    pub fn build(rules: &FeatureRules, face: RawDetection, candidates: &FeatureCandidates) -> Self {
        let face_box = face.region;
        let eyes = candidates
            .eyes
            .as_deref()
            .map(|c| rules.accept_eyes(c, &face_box))
            .unwrap_or_default();
        let nose = rules.select_nose(candidates.noses.as_deref(), &face_box);
        let mouth = candidates
            .mouths
            .as_deref()
            .and_then(|c| rules.select_mouth(c, &face_box));
        let ears = rules.synthesize_ears(&face_box);
        Self {
            face: FilteredDetection::observed(FeatureSlot::Face, face),
            eyes,
            nose,
            mouth,
            ears,
        }
    }

    /// Face first, then eyes, nose, mouth and ears.
    pub fn iter(&self) -> impl Iterator<Item = &FilteredDetection> {
        std::iter::once(&self.face)
            .chain(self.eyes.iter())
            .chain(std::iter::once(&self.nose))
            .chain(self.mouth.iter())
            .chain(self.ears.iter())
    }
}

fn fraction_of(length: i32, fraction: f64) -> i32 {
    (length as f64 * fraction).floor() as i32
}

fn to_image_space(candidate: &RawDetection, face: &Region) -> RawDetection {
    RawDetection::new(
        candidate.label.clone(),
        candidate.confidence(),
        candidate.region.relative_to(face),
    )
}
