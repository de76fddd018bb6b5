/// Axis-aligned pixel rectangle: a detection box or a search region.
///
/// Coordinates are signed so that boxes synthesised relative to a face
/// (ears hanging off its left edge) can be expressed before clipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from corner coordinates `(x1, y1, x2, y2)`.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// `(x1, y1, x2, y2)`.
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.right(), self.bottom())
    }

    /// Maps a region expressed relative to `origin` into `origin`'s space.
    pub fn relative_to(&self, origin: &Region) -> Region {
        Region::new(origin.x + self.x, origin.y + self.y, self.width, self.height)
    }

    /// Intersection with `bounds`; an empty region when they do not overlap.
    pub fn clip_to(&self, bounds: &Region) -> Region {
        let x1 = self.x.max(bounds.x);
        let y1 = self.y.max(bounds.y);
        let x2 = self.right().min(bounds.right());
        let y2 = self.bottom().min(bounds.bottom());
        if x2 <= x1 || y2 <= y1 {
            return Region::new(x1, y1, 0, 0);
        }
        Region::from_corners(x1, y1, x2, y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_corners_and_edges() {
        let r = Region::new(10, 20, 30, 40);
        assert_eq!(r.right(), 40);
        assert_eq!(r.bottom(), 60);
        assert_eq!(r.corners(), (10, 20, 40, 60));
        assert_eq!(Region::from_corners(10, 20, 40, 60), r);
    }

    #[test]
    fn test_relative_to_translates_origin() {
        let face = Region::new(100, 50, 200, 200);
        let eye = Region::new(30, 40, 20, 20);
        assert_eq!(eye.relative_to(&face), Region::new(130, 90, 20, 20));
    }

    #[test]
    fn test_clip_inside_is_unchanged() {
        let bounds = Region::new(0, 0, 100, 100);
        let r = Region::new(10, 10, 20, 20);
        assert_eq!(r.clip_to(&bounds), r);
    }

    #[test]
    fn test_clip_partial_overlap() {
        let bounds = Region::new(0, 0, 100, 100);
        let r = Region::new(-5, 90, 20, 20);
        assert_eq!(r.clip_to(&bounds), Region::new(0, 90, 15, 10));
    }

    #[test]
    fn test_clip_disjoint_is_empty() {
        let bounds = Region::new(0, 0, 100, 100);
        let clipped = Region::new(150, 150, 10, 10).clip_to(&bounds);
        assert!(clipped.is_empty());
        assert_eq!(clipped.area(), 0);
    }

    #[rstest]
    #[case::zero_width(Region::new(0, 0, 0, 10), true)]
    #[case::zero_height(Region::new(0, 0, 10, 0), true)]
    #[case::negative(Region::new(0, 0, -3, 10), true)]
    #[case::regular(Region::new(0, 0, 3, 10), false)]
    fn test_is_empty(#[case] r: Region, #[case] expected: bool) {
        assert_eq!(r.is_empty(), expected);
    }
}
