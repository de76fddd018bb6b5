/// YOLO object detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and class-aware NMS for
/// YOLOv8-style COCO models whose output rows are `[cx, cy, w, h, scores…]`.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::detections::RawDetection;
use crate::detection::domain::detector::Detector;
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Used when the model input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Pre-NMS confidence floor.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Values preceding the class scores in each output row.
const BOX_VALUES: usize = 4;

pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// YOLO object detector backed by an ONNX Runtime session.
///
/// `Session::run` needs exclusive access, so the session sits behind a
/// mutex and concurrent requests take turns.
pub struct OnnxYoloDetector {
    session: Mutex<ort::session::Session>,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Opens the model. The square input side comes from the NCHW input
    /// shape, or [`DEFAULT_INPUT_SIZE`] when that is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, VisionError> {
        let session = ort::session::Session::builder()
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| {
                VisionError::DetectorUnavailable(format!("{}: {e}", model_path.display()))
            })?;

        // NCHW: [1, 3, H, W]
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() == 4 => {
                    u32::try_from(shape[2]).ok().filter(|side| *side > 0)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session: Mutex::new(session),
            confidence,
            input_size,
        })
    }

    /// Loads the model, logging and swallowing any failure.
    pub fn try_load(model_path: &Path) -> Option<Self> {
        match Self::new(model_path, DEFAULT_CONFIDENCE) {
            Ok(detector) => {
                log::info!(
                    "Loaded object model from {} (input {}px)",
                    model_path.display(),
                    detector.input_size
                );
                Some(detector)
            }
            Err(e) => {
                log::warn!("Could not load object model: {e}");
                None
            }
        }
    }

    fn infer(&self, frame: &Frame) -> Result<Vec<RawDetection>, VisionError> {
        let mapping = Letterbox::fit(frame.width(), frame.height(), self.input_size);
        let input_value = ort::value::Tensor::from_array(mapping.tensor(frame))
            .map_err(|e| VisionError::Inference(e.to_string()))?;

        let candidates = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| VisionError::Inference("model session lock poisoned".into()))?;
            let outputs = session
                .run(ort::inputs![input_value])
                .map_err(|e| VisionError::Inference(e.to_string()))?;
            if outputs.len() == 0 {
                return Err(VisionError::Inference("YOLO model produced no outputs".into()));
            }
            let tensor = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| VisionError::Inference(e.to_string()))?;
            let data = tensor
                .as_slice()
                .ok_or_else(|| VisionError::Inference("cannot get tensor slice".into()))?;
            decode_output(data, tensor.shape(), self.confidence, &mapping)?
        };

        Ok(suppress_overlaps(candidates, NMS_IOU_THRESH)
            .into_iter()
            .map(Candidate::into_detection)
            .collect())
    }
}

impl Detector for OnnxYoloDetector {
    fn detect(&self, frame: &Frame, roi: Option<&Region>) -> Result<Vec<RawDetection>, VisionError> {
        match roi {
            None => self.infer(frame),
            Some(roi) => match frame.crop(roi) {
                Some(crop) => self.infer(&crop),
                None => Ok(Vec::new()),
            },
        }
    }
}

// ── Letterbox ──

/// Square model input built from a frame, plus the inverse mapping for boxes.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    side: u32,
    scale: f64,
    fitted_w: u32,
    fitted_h: u32,
    pad_x: u32,
    pad_y: u32,
    frame_w: u32,
    frame_h: u32,
}

impl Letterbox {
    fn fit(frame_w: u32, frame_h: u32, side: u32) -> Self {
        let scale = (side as f64 / frame_w as f64).min(side as f64 / frame_h as f64);
        let fitted_w = ((frame_w as f64 * scale).round() as u32).clamp(1, side);
        let fitted_h = ((frame_h as f64 * scale).round() as u32).clamp(1, side);
        Self {
            side,
            scale,
            fitted_w,
            fitted_h,
            pad_x: (side - fitted_w) / 2,
            pad_y: (side - fitted_h) / 2,
            frame_w,
            frame_h,
        }
    }

    /// NCHW tensor in `[0, 1]`, padding filled with YOLO grey (114).
    fn tensor(&self, frame: &Frame) -> ndarray::Array4<f32> {
        let side = self.side as usize;
        let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, side, side), 114.0 / 255.0);

        let resized = image::imageops::resize(
            &frame.to_rgb_image(),
            self.fitted_w,
            self.fitted_h,
            image::imageops::FilterType::Triangle,
        );
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (tx, ty) = ((self.pad_x + x) as usize, (self.pad_y + y) as usize);
            for (c, value) in pixel.0.iter().enumerate() {
                tensor[[0, c, ty, tx]] = *value as f32 / 255.0;
            }
        }
        tensor
    }

    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            ((x - self.pad_x as f64) / self.scale).clamp(0.0, self.frame_w as f64),
            ((y - self.pad_y as f64) / self.scale).clamp(0.0, self.frame_h as f64),
        )
    }
}

// ── Output decoding ──

#[derive(Clone, Debug)]
struct Candidate {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
    class: usize,
}

impl Candidate {
    /// Corners are clamped to the frame, so truncation floors them.
    fn into_detection(self) -> RawDetection {
        let label = COCO_LABELS
            .get(self.class)
            .map(|l| l.to_string())
            .unwrap_or_else(|| format!("class {}", self.class));
        let region = Region::from_corners(self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32);
        RawDetection::new(label, self.confidence, region)
    }

    fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f64 {
        let overlap_w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let overlap_h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let overlap = overlap_w * overlap_h;
        let union = self.area() + other.area() - overlap;
        if overlap <= 0.0 || union <= 0.0 {
            0.0
        } else {
            overlap / union
        }
    }
}

/// Parses `[1, 4+C, N]` or `[1, N, 4+C]` output into candidates above `floor`.
fn decode_output(
    data: &[f32],
    shape: &[usize],
    floor: f64,
    letterbox: &Letterbox,
) -> Result<Vec<Candidate>, VisionError> {
    if shape.len() != 3 {
        return Err(VisionError::Inference(format!(
            "unexpected YOLO output shape: {shape:?}"
        )));
    }
    // Fewer features than detections means the layout is transposed.
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats <= BOX_VALUES || data.len() < num_dets * num_feats {
        return Err(VisionError::Inference(format!(
            "YOLO output {shape:?} has no class scores"
        )));
    }
    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut candidates = Vec::new();
    for i in 0..num_dets {
        let (class, confidence) = (BOX_VALUES..num_feats)
            .map(|f| (f - BOX_VALUES, value(i, f)))
            .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        if confidence < floor {
            continue;
        }

        let cx = value(i, 0);
        let cy = value(i, 1);
        let w = value(i, 2);
        let h = value(i, 3);
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        candidates.push(Candidate {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class,
        });
    }
    Ok(candidates)
}

/// Greedy per-class NMS, strongest first.
fn suppress_overlaps(mut candidates: Vec<Candidate>, iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps_kept = kept
            .iter()
            .any(|k| k.class == candidate.class && k.iou(&candidate) > iou_thresh);
        if !overlaps_kept {
            kept.push(candidate);
        }
    }
    kept
}
