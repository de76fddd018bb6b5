//! Deterministic drawing instructions derived from filtered detections.
//!
//! Rectangles use inclusive corners: a shape over `Region { x, y, w, h }`
//! covers pixels `x..=x + w` and `y..=y + h`. Outline strokes are centred on
//! that edge. Text positions are the left end of the baseline.

use crate::annotation::domain::palette::{self, Color};
use crate::detection::domain::detections::FeatureSlot;
use crate::detection::domain::face_features::FaceFeatures;
use crate::detection::domain::object_filter::ObjectDetection;
use crate::shared::region::Region;

pub const FACE_THICKNESS: u32 = 3;
pub const FEATURE_THICKNESS: u32 = 2;
pub const OBJECT_THICKNESS: u32 = 2;

pub const LEGEND_PANEL: Region = Region::new(10, 10, 210, 120);
pub const LEGEND_INNER: Region = Region::new(11, 11, 208, 118);
/// Weight of the dark panel over the original pixels.
pub const LEGEND_OPACITY: f32 = 0.85;
pub const LEGEND_BORDER: u32 = 2;
pub const LEGEND_TITLE: &str = "FEATURE DETECTION";
pub const LEGEND_TITLE_AT: (i32, i32) = (15, 28);
pub const LEGEND_RULE: ((i32, i32), (i32, i32)) = ((15, 32), (205, 32));
pub const LEGEND_SWATCH_X: i32 = 15;
pub const LEGEND_SWATCH_SIZE: i32 = 10;
pub const LEGEND_LABEL_X: i32 = 30;
pub const LEGEND_FIRST_ROW_Y: i32 = 40;
pub const LEGEND_ROW_STEP: i32 = 15;
pub const LEGEND_COUNT_AT: (i32, i32) = (120, 47);
/// Legend text size in Hershey-style scale units.
pub const LEGEND_TEXT_SCALE: f32 = 0.4;

pub const OBJECT_TEXT_SCALE: f32 = 0.6;
pub const OBJECT_TEXT_THICKNESS: u32 = 2;
pub const OBJECT_LABEL_OFFSET: i32 = 10;
pub const OBJECT_LABEL_MIN_Y: i32 = 20;

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Hollow rectangle with a `thickness` pixel stroke centred on the edge.
    ///
    /// With `clip`, only pixels inside `clip.x..clip.x + w` and
    /// `clip.y..clip.y + h` are painted.
    Rect {
        region: Region,
        color: Color,
        thickness: u32,
        clip: Option<Region>,
    },
    FilledRect {
        region: Region,
        color: Color,
    },
    /// `color` mixed over the existing pixels with weight `opacity`.
    Blend {
        region: Region,
        color: Color,
        opacity: f32,
    },
    Line {
        from: (i32, i32),
        to: (i32, i32),
        color: Color,
    },
    Text {
        baseline: (i32, i32),
        text: String,
        color: Color,
        scale: f32,
        thickness: u32,
    },
}

/// What an annotated image shows, for the response payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationSummary {
    pub primary_count: usize,
    pub features_present: bool,
    pub labels: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationPlan {
    pub shapes: Vec<Shape>,
    pub summary: AnnotationSummary,
}

impl AnnotationPlan {
    /// Legend (when at least one face is present), then each face followed
    /// by its eyes, nose, mouth and ears.
    pub fn for_faces(faces: &[FaceFeatures]) -> Self {
        let mut plan = Self {
            shapes: Vec::new(),
            summary: AnnotationSummary {
                primary_count: faces.len(),
                features_present: !faces.is_empty(),
                labels: faces.iter().map(|_| "Face".to_string()).collect(),
            },
        };
        if !faces.is_empty() {
            plan.push_legend(faces.len());
        }
        for face in faces {
            let face_box = face.face.region();
            for det in face.iter() {
                let region = det.region();
                if region.is_empty() {
                    continue;
                }
                let (thickness, clip) = if det.slot == FeatureSlot::Face {
                    (FACE_THICKNESS, None)
                } else {
                    (FEATURE_THICKNESS, Some(face_box))
                };
                plan.shapes.push(Shape::Rect {
                    region,
                    color: palette::slot_color(det.slot),
                    thickness,
                    clip,
                });
            }
        }
        plan
    }

    /// A box and a `"{Label} {confidence:.2}"` caption per object.
    pub fn for_objects(objects: &[ObjectDetection]) -> Self {
        let mut shapes = Vec::with_capacity(objects.len() * 2);
        for obj in objects {
            let region = obj.region();
            shapes.push(Shape::Rect {
                region,
                color: palette::OBJECT,
                thickness: OBJECT_THICKNESS,
                clip: None,
            });
            shapes.push(Shape::Text {
                baseline: (region.x, (region.y - OBJECT_LABEL_OFFSET).max(OBJECT_LABEL_MIN_Y)),
                text: format!("{} {:.2}", obj.display_label(), obj.confidence()),
                color: palette::OBJECT,
                scale: OBJECT_TEXT_SCALE,
                thickness: OBJECT_TEXT_THICKNESS,
            });
        }
        Self {
            shapes,
            summary: AnnotationSummary {
                primary_count: objects.len(),
                features_present: !objects.is_empty(),
                labels: objects.iter().map(|o| o.display_label()).collect(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn push_legend(&mut self, face_count: usize) {
        let legend_text = |baseline: (i32, i32), text: String, color: Color| Shape::Text {
            baseline,
            text,
            color,
            scale: LEGEND_TEXT_SCALE,
            thickness: 1,
        };

        self.shapes.push(Shape::Blend {
            region: LEGEND_PANEL,
            color: palette::PANEL,
            opacity: LEGEND_OPACITY,
        });
        self.shapes.push(Shape::Rect {
            region: LEGEND_PANEL,
            color: palette::WHITE,
            thickness: LEGEND_BORDER,
            clip: None,
        });
        self.shapes.push(Shape::Rect {
            region: LEGEND_INNER,
            color: palette::GREY,
            thickness: 1,
            clip: None,
        });
        self.shapes.push(legend_text(
            LEGEND_TITLE_AT,
            LEGEND_TITLE.to_string(),
            palette::WHITE,
        ));
        self.shapes.push(Shape::Line {
            from: LEGEND_RULE.0,
            to: LEGEND_RULE.1,
            color: palette::WHITE,
        });

        let mut y = LEGEND_FIRST_ROW_Y;
        for (color, label) in palette::LEGEND_ENTRIES {
            let swatch = Region::new(LEGEND_SWATCH_X, y, LEGEND_SWATCH_SIZE, LEGEND_SWATCH_SIZE);
            self.shapes.push(Shape::FilledRect {
                region: swatch,
                color,
            });
            self.shapes.push(Shape::Rect {
                region: swatch,
                color: palette::WHITE,
                thickness: 1,
                clip: None,
            });
            self.shapes.push(legend_text(
                (LEGEND_LABEL_X, y + 7),
                label.to_string(),
                palette::WHITE,
            ));
            y += LEGEND_ROW_STEP;
        }
        self.shapes.push(legend_text(
            LEGEND_COUNT_AT,
            format!("Detected: {face_count}"),
            palette::FACE,
        ));
    }
}
