use image::{GrayImage, RgbImage};
use ndarray::ArrayView3;

use crate::shared::region::Region;

const CHANNELS: usize = 3;

/// A single image or camera frame: contiguous RGB bytes in row-major order.
///
/// Decoding and encoding happen at the service boundary only; detectors and
/// the annotator work on this type.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
        }
    }

    pub fn from_rgb_image(image: RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, index)
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("Frame data length must match dimensions")
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The whole frame as a region at the origin.
    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Horizontally mirrored copy, as shown by a selfie camera preview.
    pub fn mirrored(&self) -> Frame {
        let row_len = self.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_len.max(1)) {
            for px in row.chunks_exact(CHANNELS).rev() {
                data.extend_from_slice(px);
            }
        }
        Frame::new(data, self.width, self.height, self.index)
    }

    /// RGB copy of `roi` clipped to the frame; `None` when nothing remains.
    pub fn crop(&self, roi: &Region) -> Option<Frame> {
        let clipped = roi.clip_to(&self.bounds());
        if clipped.is_empty() {
            return None;
        }
        let stride = self.width as usize * CHANNELS;
        let row_len = clipped.width as usize * CHANNELS;
        let mut data = Vec::with_capacity(row_len * clipped.height as usize);
        for y in clipped.y..clipped.bottom() {
            let start = y as usize * stride + clipped.x as usize * CHANNELS;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Some(Frame::new(
            data,
            clipped.width as u32,
            clipped.height as u32,
            self.index,
        ))
    }

    /// Grayscale copy of `roi` (clipped to the frame) using BT.601 luma weights.
    ///
    /// Returns `None` when the clipped region is empty.
    pub fn gray_crop(&self, roi: &Region) -> Option<GrayImage> {
        let clipped = roi.clip_to(&self.bounds());
        if clipped.is_empty() {
            return None;
        }
        let (w, h) = (clipped.width as u32, clipped.height as u32);
        let stride = self.width as usize * CHANNELS;
        let mut gray = GrayImage::new(w, h);
        for y in 0..h {
            let row = (clipped.y as usize + y as usize) * stride;
            for x in 0..w {
                let i = row + (clipped.x as usize + x as usize) * CHANNELS;
                let (r, g, b) = (
                    self.data[i] as f32,
                    self.data[i + 1] as f32,
                    self.data[i + 2] as f32,
                );
                let luma = 0.299 * r + 0.587 * g + 0.114 * b;
                gray.put_pixel(x, y, image::Luma([luma.round().min(255.0) as u8]));
            }
        }
        Some(gray)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, CHANNELS)
    }
}
