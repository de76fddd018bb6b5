//! Summed-area tables for constant-time rectangle sums.
//!
//! Upright and squared tables have one extra leading row and column of
//! zeros, so `at(x, y)` is the sum of all pixels strictly above and to the
//! left of `(x, y)`. The tilted table follows the same convention for
//! 45°-rotated rectangles.

use image::GrayImage;

pub struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<i64>,
    squared: Vec<i64>,
    tilted: Option<TiltedIntegral>,
}

impl IntegralImage {
    /// Builds the upright and squared tables; the tilted table only when
    /// `with_tilted` is set.
    pub fn new(image: &GrayImage, with_tilted: bool) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let stride = width + 1;
        let raw = image.as_raw();

        let mut sum = vec![0i64; stride * (height + 1)];
        let mut squared = vec![0i64; stride * (height + 1)];
        for y in 0..height {
            let mut row_sum = 0i64;
            let mut row_sq = 0i64;
            for x in 0..width {
                let p = raw[y * width + x] as i64;
                row_sum += p;
                row_sq += p * p;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                squared[idx] = squared[idx - stride] + row_sq;
            }
        }

        let tilted = with_tilted.then(|| TiltedIntegral::new(raw, width, height));
        Self {
            width,
            height,
            sum,
            squared,
            tilted,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn has_tilted(&self) -> bool {
        self.tilted.is_some()
    }

    /// Sum of pixels in `[x, x + w) × [y, y + h)`.
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        table_rect(&self.sum, self.width + 1, x, y, w, h)
    }

    pub fn squared_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        table_rect(&self.squared, self.width + 1, x, y, w, h)
    }

    /// Sum over a 45°-rotated rectangle whose top corner is `(x, y)`, `w`
    /// along the down-right diagonal and `h` along the down-left diagonal.
    ///
    /// Returns 0 when the tilted table was not built.
    pub fn tilted_sum(&self, x: i64, y: i64, w: i64, h: i64) -> i64 {
        match &self.tilted {
            Some(t) => {
                t.at(x, y) - t.at(x - h, y + h) - t.at(x + w, y + w) + t.at(x + w - h, y + w + h)
            }
            None => 0,
        }
    }
}

fn table_rect(table: &[i64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> i64 {
    let top = y * stride;
    let bottom = (y + h) * stride;
    table[bottom + x + w] - table[top + x + w] - table[bottom + x] + table[top + x]
}

/// Rotated summed-area table.
///
/// `at(X, Y)` sums every pixel `(x, y)` with `y < Y` and
/// `|x - X + 1| <= Y - y - 1`: the upward triangle whose apex is the pixel
/// `(X - 1, Y - 1)`. Apex columns are padded by the image height on both
/// sides so triangles near the edges are complete.
struct TiltedIntegral {
    pad: i64,
    stride: usize,
    height: usize,
    apex: Vec<i64>,
}

impl TiltedIntegral {
    fn new(raw: &[u8], width: usize, height: usize) -> Self {
        let pad = height as i64 + 1;
        let stride = width + 2 * pad as usize;
        let pixel = |x: i64, y: i64| -> i64 {
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                0
            } else {
                raw[y as usize * width + x as usize] as i64
            }
        };

        let mut apex = vec![0i64; stride * height];
        for y in 0..height {
            for col in 0..stride {
                let x = col as i64 - pad;
                let yi = y as i64;
                let mut v = pixel(x, yi) + pixel(x, yi - 1);
                if y >= 1 {
                    let prev = (y - 1) * stride;
                    if col >= 1 {
                        v += apex[prev + col - 1];
                    }
                    if col + 1 < stride {
                        v += apex[prev + col + 1];
                    }
                }
                if y >= 2 {
                    v -= apex[(y - 2) * stride + col];
                }
                apex[y * stride + col] = v;
            }
        }

        Self {
            pad,
            stride,
            height,
            apex,
        }
    }

    fn at(&self, x: i64, y: i64) -> i64 {
        if y <= 0 {
            return 0;
        }
        let row = (y - 1).min(self.height as i64 - 1) as usize;
        let col = x - 1 + self.pad;
        if col < 0 || col >= self.stride as i64 {
            return 0;
        }
        self.apex[row * self.stride + col as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn patterned(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| image::Luma([((x * 7 + y * 13) % 251) as u8]))
    }

    fn brute_rect(img: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> i64 {
        let mut s = 0i64;
        for yy in y..y + h {
            for xx in x..x + w {
                s += img.get_pixel(xx, yy)[0] as i64;
            }
        }
        s
    }

    fn brute_tilted_at(img: &GrayImage, big_x: i64, big_y: i64) -> i64 {
        let mut s = 0i64;
        for y in 0..img.height() as i64 {
            for x in 0..img.width() as i64 {
                if y < big_y && (x - big_x + 1).abs() <= big_y - y - 1 {
                    s += img.get_pixel(x as u32, y as u32)[0] as i64;
                }
            }
        }
        s
    }

    #[rstest]
    #[case(0, 0, 1, 1)]
    #[case(3, 2, 5, 4)]
    #[case(0, 0, 12, 9)]
    #[case(11, 8, 1, 1)]
    fn test_rect_sum_matches_brute_force(
        #[case] x: u32,
        #[case] y: u32,
        #[case] w: u32,
        #[case] h: u32,
    ) {
        let img = patterned(12, 9);
        let ii = IntegralImage::new(&img, false);
        assert_eq!(
            ii.rect_sum(x as usize, y as usize, w as usize, h as usize),
            brute_rect(&img, x, y, w, h)
        );
    }

    #[test]
    fn test_squared_sum_of_constant_image() {
        let img = GrayImage::from_pixel(4, 3, image::Luma([10]));
        let ii = IntegralImage::new(&img, false);
        assert_eq!(ii.squared_sum(0, 0, 4, 3), 12 * 100);
        assert_eq!(ii.rect_sum(1, 1, 2, 2), 40);
    }

    #[test]
    fn test_tilted_table_matches_definition() {
        let img = patterned(9, 7);
        let ii = IntegralImage::new(&img, true);
        let t = ii.tilted.as_ref().unwrap();
        for y in 0..=7 {
            for x in 0..=9 {
                assert_eq!(t.at(x, y), brute_tilted_at(&img, x, y), "at ({x}, {y})");
            }
        }
    }

    #[rstest]
    #[case(10, 2, 1, 1)]
    #[case(10, 3, 3, 2)]
    #[case(12, 1, 4, 5)]
    fn test_tilted_rect_covers_twice_its_area(
        #[case] x: i64,
        #[case] y: i64,
        #[case] w: i64,
        #[case] h: i64,
    ) {
        let img = GrayImage::from_pixel(24, 24, image::Luma([1]));
        let ii = IntegralImage::new(&img, true);
        assert_eq!(ii.tilted_sum(x, y, w, h), 2 * w * h);
    }

    #[test]
    fn test_tilted_skipped_when_not_requested() {
        let img = patterned(5, 5);
        let ii = IntegralImage::new(&img, false);
        assert!(!ii.has_tilted());
        assert_eq!(ii.tilted_sum(2, 0, 1, 1), 0);
    }
}
