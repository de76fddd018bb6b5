use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::domain::palette::Color;
use crate::annotation::domain::plan::{AnnotationPlan, Shape};
use crate::shared::error::VisionError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Pixel height per unit of Hershey-style text scale.
const PX_PER_TEXT_SCALE: f32 = 30.0;

/// CPU renderer drawing plans with `imageproc`.
///
/// Text needs a font; without one, captions are skipped and every other
/// shape is still drawn.
pub struct CanvasRenderer {
    font: Option<FontVec>,
}

impl CanvasRenderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    fn draw(&self, img: &mut RgbImage, shape: &Shape) {
        match shape {
            Shape::Rect {
                region,
                color,
                thickness,
                clip,
            } => match clip {
                Some(clip) => draw_thick_rect_within(img, region, Rgb(*color), *thickness, clip),
                None => draw_thick_rect(img, region, Rgb(*color), *thickness),
            },
            Shape::FilledRect { region, color } => {
                if let Some(rect) = inclusive_rect(region, 0) {
                    draw_filled_rect_mut(img, rect, Rgb(*color));
                }
            }
            Shape::Blend {
                region,
                color,
                opacity,
            } => blend_rect(img, region, *color, *opacity),
            Shape::Line { from, to, color } => draw_line_segment_mut(
                img,
                (from.0 as f32, from.1 as f32),
                (to.0 as f32, to.1 as f32),
                Rgb(*color),
            ),
            Shape::Text {
                baseline,
                text,
                color,
                scale,
                thickness,
            } => {
                let Some(font) = &self.font else {
                    return;
                };
                let px = PxScale::from(scale * PX_PER_TEXT_SCALE);
                let (_, height) = text_size(px, font, text);
                let top = baseline.1 - height as i32;
                for dx in 0..(*thickness).max(1) as i32 {
                    draw_text_mut(img, Rgb(*color), baseline.0 + dx, top, px, font, text);
                }
            }
        }
    }
}

impl FrameAnnotator for CanvasRenderer {
    fn render(&self, frame: &mut Frame, plan: &AnnotationPlan) -> Result<(), VisionError> {
        if plan.is_empty() {
            return Ok(());
        }
        let mut img = frame.to_rgb_image();
        for shape in &plan.shapes {
            self.draw(&mut img, shape);
        }
        frame.data_mut().copy_from_slice(img.as_raw());
        Ok(())
    }
}

/// The pixel rectangle `x..=right, y..=bottom`, shrunk by `inset` on each side.
fn inclusive_rect(region: &Region, inset: i32) -> Option<Rect> {
    let w = region.width + 1 - 2 * inset;
    let h = region.height + 1 - 2 * inset;
    if w <= 0 || h <= 0 {
        return None;
    }
    Some(Rect::at(region.x + inset, region.y + inset).of_size(w as u32, h as u32))
}

/// Strokes at offsets `-(t / 2)..=(t - 1) / 2` around the box edge.
fn draw_thick_rect(img: &mut RgbImage, region: &Region, color: Rgb<u8>, thickness: u32) {
    let t = thickness.max(1) as i32;
    for offset in -(t / 2)..=(t - 1) / 2 {
        if let Some(rect) = inclusive_rect(region, offset) {
            draw_hollow_rect_mut(img, rect, color);
        }
    }
}

/// Draws onto the `clip` window only, leaving everything outside untouched.
fn draw_thick_rect_within(
    img: &mut RgbImage,
    region: &Region,
    color: Rgb<u8>,
    thickness: u32,
    clip: &Region,
) {
    let canvas = Region::new(0, 0, img.width() as i32, img.height() as i32);
    let window = clip.clip_to(&canvas);
    if window.is_empty() {
        return;
    }
    let mut view = image::imageops::crop_imm(
        &*img,
        window.x as u32,
        window.y as u32,
        window.width as u32,
        window.height as u32,
    )
    .to_image();
    let local = Region::new(
        region.x - window.x,
        region.y - window.y,
        region.width,
        region.height,
    );
    draw_thick_rect(&mut view, &local, color, thickness);
    image::imageops::replace(img, &view, window.x as i64, window.y as i64);
}

fn blend_rect(img: &mut RgbImage, region: &Region, color: Color, opacity: f32) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let x0 = region.x.max(0);
    let y0 = region.y.max(0);
    let x1 = region.right().min(w - 1);
    let y1 = region.bottom().min(h - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let px = img.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let mixed = opacity * color[c] as f32 + (1.0 - opacity) * px.0[c] as f32;
                px.0[c] = mixed.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
