//! Viola–Jones cascade evaluation over an image pyramid.
//!
//! The image is downscaled rather than the features upscaled, so every
//! window is evaluated at the cascade's native size against freshly built
//! integral tables. Feature responses are normalised by the window's
//! standard deviation before being compared with node thresholds.

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::shared::error::VisionError;
use crate::shared::region::Region;

use super::integral_image::IntegralImage;
use super::math::partition;

/// Similarity tolerance used when merging neighbouring candidates.
pub const GROUP_EPS: f64 = 0.2;

/// A boosted cascade: stages of weak classifiers over a shared feature pool.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarCascade {
    /// Native window `(width, height)`.
    pub window: (usize, usize),
    pub stages: Vec<Stage>,
    pub features: Vec<HaarFeature>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

/// A decision tree. Child indices `<= 0` refer to `leaves[-child]`.
#[derive(Clone, Debug, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeNode {
    pub feature: usize,
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
    pub tilted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub weight: f64,
}

/// Multi-scale search parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParams {
    pub scale_factor: f64,
    pub min_neighbors: usize,
    pub min_size: (u32, u32),
    pub max_size: Option<(u32, u32)>,
}

impl CascadeParams {
    pub const FACE: CascadeParams = CascadeParams {
        scale_factor: 1.1,
        min_neighbors: 5,
        min_size: (60, 60),
        max_size: None,
    };

    pub const EYE: CascadeParams = CascadeParams {
        scale_factor: 1.1,
        min_neighbors: 8,
        min_size: (20, 20),
        max_size: Some((80, 80)),
    };

    pub const NOSE: CascadeParams = CascadeParams {
        scale_factor: 1.1,
        min_neighbors: 5,
        min_size: (30, 30),
        max_size: Some((100, 100)),
    };

    pub const MOUTH: CascadeParams = CascadeParams {
        scale_factor: 1.2,
        min_neighbors: 15,
        min_size: (40, 20),
        max_size: Some((120, 80)),
    };

    /// Neighbour votes mapped into `[0, 1)`.
    pub fn confidence(&self, neighbors: usize) -> f64 {
        let n = neighbors as f64;
        n / (n + self.min_neighbors as f64)
    }
}

impl HaarCascade {
    pub fn has_tilted(&self) -> bool {
        self.features.iter().any(|f| f.tilted)
    }

    /// Checks every index and rectangle so evaluation cannot go out of bounds.
    pub fn validate(&self) -> Result<(), VisionError> {
        let (ww, wh) = (self.window.0 as i32, self.window.1 as i32);
        if ww < 3 || wh < 3 {
            return Err(VisionError::CascadeFormat(format!(
                "window {ww}x{wh} is too small"
            )));
        }
        if self.stages.is_empty() {
            return Err(VisionError::CascadeFormat("cascade has no stages".into()));
        }
        for (fi, feature) in self.features.iter().enumerate() {
            for r in &feature.rects {
                let inside = if feature.tilted {
                    r.x - r.height >= 0
                        && r.x + r.width <= ww
                        && r.y >= 0
                        && r.y + r.width + r.height <= wh
                } else {
                    r.x >= 0 && r.y >= 0 && r.x + r.width <= ww && r.y + r.height <= wh
                };
                if !inside || r.width < 0 || r.height < 0 {
                    return Err(VisionError::CascadeFormat(format!(
                        "feature {fi} rectangle lies outside the {ww}x{wh} window"
                    )));
                }
            }
        }
        for (si, stage) in self.stages.iter().enumerate() {
            for classifier in &stage.classifiers {
                classifier
                    .validate(self.features.len())
                    .map_err(|msg| VisionError::CascadeFormat(format!("stage {si}: {msg}")))?;
            }
        }
        Ok(())
    }

    /// Runs the cascade over `image` and returns grouped hits with their
    /// neighbour counts, in image coordinates.
    pub fn detect_multi_scale(
        &self,
        image: &GrayImage,
        params: &CascadeParams,
    ) -> Result<Vec<(Region, usize)>, VisionError> {
        if params.scale_factor.is_nan() || params.scale_factor <= 1.0 {
            return Err(VisionError::Inference(format!(
                "scale factor must exceed 1, got {}",
                params.scale_factor
            )));
        }
        let candidates = self.scan_pyramid(image, params);
        Ok(group_rectangles(&candidates, params.min_neighbors, GROUP_EPS))
    }

    fn scan_pyramid(&self, image: &GrayImage, params: &CascadeParams) -> Vec<Region> {
        let (ow, oh) = (self.window.0 as u32, self.window.1 as u32);
        let (iw, ih) = image.dimensions();
        let (max_w, max_h) = params.max_size.unwrap_or((iw, ih));
        let with_tilted = self.has_tilted();

        let mut candidates = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let win_w = (ow as f64 * factor).round() as u32;
            let win_h = (oh as f64 * factor).round() as u32;
            let scaled_w = (iw as f64 / factor).round() as u32;
            let scaled_h = (ih as f64 / factor).round() as u32;
            if scaled_w <= ow || scaled_h <= oh {
                break;
            }
            if win_w > max_w || win_h > max_h {
                break;
            }
            if win_w >= params.min_size.0 && win_h >= params.min_size.1 {
                let scaled = if scaled_w == iw && scaled_h == ih {
                    image.clone()
                } else {
                    imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle)
                };
                let integral = IntegralImage::new(&scaled, with_tilted);
                let step = if factor > 2.0 { 1 } else { 2 };
                for y in (0..(scaled_h - oh) as usize).step_by(step) {
                    for x in (0..(scaled_w - ow) as usize).step_by(step) {
                        if self.window_passes(&integral, x, y) {
                            candidates.push(Region::new(
                                (x as f64 * factor).round() as i32,
                                (y as f64 * factor).round() as i32,
                                win_w as i32,
                                win_h as i32,
                            ));
                        }
                    }
                }
            }
            factor *= params.scale_factor;
        }
        log::trace!("cascade scan produced {} raw windows", candidates.len());
        candidates
    }

    /// Whether the window at `(x, y)` of `integral` passes every stage.
    pub fn window_passes(&self, integral: &IntegralImage, x: usize, y: usize) -> bool {
        let (ww, wh) = self.window;
        let (nw, nh) = (ww - 2, wh - 2);
        let area = (nw * nh) as f64;
        let sum = integral.rect_sum(x + 1, y + 1, nw, nh) as f64;
        let sq = integral.squared_sum(x + 1, y + 1, nw, nh) as f64;
        let variance = area * sq - sum * sum;
        let norm = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        for stage in &self.stages {
            let mut stage_sum = 0.0;
            for classifier in &stage.classifiers {
                let mut idx: i32 = 0;
                loop {
                    let node = &classifier.nodes[idx as usize];
                    let value = self.features[node.feature].response(integral, x, y) / norm;
                    idx = if value < node.threshold {
                        node.left
                    } else {
                        node.right
                    };
                    if idx <= 0 {
                        break;
                    }
                }
                stage_sum += classifier.leaves[(-idx) as usize];
            }
            if stage_sum < stage.threshold {
                return false;
            }
        }
        true
    }
}

impl WeakClassifier {
    fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("weak classifier has no nodes".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.feature >= feature_count {
                return Err(format!("feature index {} out of range", node.feature));
            }
            for child in [node.left, node.right] {
                let ok = if child > 0 {
                    (child as usize) > i && (child as usize) < self.nodes.len()
                } else {
                    ((-child) as usize) < self.leaves.len()
                };
                if !ok {
                    return Err(format!("node {i} has invalid child {child}"));
                }
            }
        }
        Ok(())
    }
}

impl HaarFeature {
    /// Weighted rectangle sum with the window's top-left at `(ox, oy)`.
    fn response(&self, integral: &IntegralImage, ox: usize, oy: usize) -> f64 {
        self.rects
            .iter()
            .map(|r| {
                let s = if self.tilted {
                    integral.tilted_sum(
                        ox as i64 + r.x as i64,
                        oy as i64 + r.y as i64,
                        r.width as i64,
                        r.height as i64,
                    )
                } else {
                    integral.rect_sum(
                        ox + r.x as usize,
                        oy + r.y as usize,
                        r.width as usize,
                        r.height as usize,
                    )
                };
                s as f64 * r.weight
            })
            .sum()
    }
}

/// Merges overlapping candidates into averaged boxes.
///
/// Groups with `neighbors <= group_threshold` are dropped, as are groups
/// lying inside a stronger neighbouring group. A threshold of 0 returns the
/// candidates unmerged with one vote each.
pub fn group_rectangles(
    rects: &[Region],
    group_threshold: usize,
    eps: f64,
) -> Vec<(Region, usize)> {
    if group_threshold == 0 || rects.is_empty() {
        return rects.iter().map(|r| (*r, 1)).collect();
    }

    let (labels, class_count) = partition(rects, |a, b| similar(a, b, eps));
    let mut sums = vec![[0i64; 4]; class_count];
    let mut votes = vec![0usize; class_count];
    for (r, &cls) in rects.iter().zip(&labels) {
        sums[cls][0] += r.x as i64;
        sums[cls][1] += r.y as i64;
        sums[cls][2] += r.width as i64;
        sums[cls][3] += r.height as i64;
        votes[cls] += 1;
    }
    let averaged: Vec<Region> = sums
        .iter()
        .zip(&votes)
        .map(|(s, &n)| {
            let avg = |v: i64| (v as f64 / n as f64).round() as i32;
            Region::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = votes[i];
        if n1 <= group_threshold {
            continue;
        }
        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = votes[j];
            if j == i || n2 <= group_threshold {
                return false;
            }
            let dx = (r2.width as f64 * eps).round() as i32;
            let dy = (r2.height as f64 * eps).round() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.right() <= r2.right() + dx
                && r1.bottom() <= r2.bottom() + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !nested {
            grouped.push((*r1, n1));
        }
    }
    grouped
}

fn similar(a: &Region, b: &Region, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: i32, q: i32| ((p - q).abs() as f64) <= delta;
    close(a.x, b.x) && close(a.y, b.y) && close(a.right(), b.right()) && close(a.bottom(), b.bottom())
}
