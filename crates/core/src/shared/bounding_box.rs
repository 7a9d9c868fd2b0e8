/// Axis-aligned face box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Integer crop rectangle guaranteed to lie inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Tight box around the given points. `None` for an empty slice.
    pub fn enclosing(points: &[(f64, f64)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let init = Self::new(first.0, first.1, first.0, first.1);
        Some(rest.iter().fold(init, |b, &(x, y)| {
            Self::new(b.x_min.min(x), b.y_min.min(y), b.x_max.max(x), b.y_max.max(y))
        }))
    }

    pub fn width(&self) -> f64 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// True when both sides reach `min_size`. Smaller boxes are usually
    /// partial or spurious detections.
    pub fn is_at_least(&self, min_size: f64) -> bool {
        self.width() >= min_size && self.height() >= min_size
    }

    /// Grows each side by `ratio` of the box's own width/height.
    pub fn padded(&self, ratio: f64) -> Self {
        let dx = self.width() * ratio;
        let dy = self.height() * ratio;
        Self::new(
            self.x_min - dx,
            self.y_min - dy,
            self.x_max + dx,
            self.y_max + dy,
        )
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter = BoundingBox::new(
            self.x_min.max(other.x_min),
            self.y_min.max(other.y_min),
            self.x_max.min(other.x_max),
            self.y_max.min(other.y_max),
        )
        .area();
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Clamps to `frame_w` x `frame_h` and rounds outward to whole pixels.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn to_pixel_rect(&self, frame_w: u32, frame_h: u32) -> Option<PixelRect> {
        let x1 = self.x_min.floor().clamp(0.0, frame_w as f64) as u32;
        let y1 = self.y_min.floor().clamp(0.0, frame_h as f64) as u32;
        let x2 = self.x_max.ceil().clamp(0.0, frame_w as f64) as u32;
        let y2 = self.y_max.ceil().clamp(0.0, frame_h as f64) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_enclosing_points() {
        let b = BoundingBox::enclosing(&[(10.0, 40.0), (30.0, 20.0), (25.0, 60.0)]).unwrap();
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 30.0, 60.0));
    }

    #[test]
    fn test_enclosing_empty_is_none() {
        assert!(BoundingBox::enclosing(&[]).is_none());
    }

    #[test]
    fn test_dimensions_and_center() {
        let b = BoundingBox::new(100.0, 50.0, 300.0, 250.0);
        assert_relative_eq!(b.width(), 200.0);
        assert_relative_eq!(b.height(), 200.0);
        assert_relative_eq!(b.area(), 40_000.0);
        assert_eq!(b.center(), (200.0, 150.0));
    }

    #[test]
    fn test_inverted_box_has_zero_size() {
        let b = BoundingBox::new(10.0, 10.0, 5.0, 5.0);
        assert_relative_eq!(b.area(), 0.0);
    }

    #[rstest]
    #[case(80.0, 80.0, true)]
    #[case(79.9, 120.0, false)]
    #[case(120.0, 79.9, false)]
    fn test_min_size_gate(#[case] w: f64, #[case] h: f64, #[case] expected: bool) {
        let b = BoundingBox::new(0.0, 0.0, w, h);
        assert_eq!(b.is_at_least(80.0), expected);
    }

    #[test]
    fn test_padded_grows_each_side() {
        let b = BoundingBox::new(100.0, 100.0, 200.0, 300.0).padded(0.1);
        assert_relative_eq!(b.x_min, 90.0);
        assert_relative_eq!(b.x_max, 210.0);
        assert_relative_eq!(b.y_min, 80.0);
        assert_relative_eq!(b.y_max, 320.0);
    }

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_relative_eq!(a.iou(&a), 1.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        // inter 50, union 150
        assert_relative_eq!(a.iou(&b), 1.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pixel_rect_clamps_to_frame() {
        let b = BoundingBox::new(-20.5, 10.2, 130.0, 90.7);
        let r = b.to_pixel_rect(100, 80).unwrap();
        assert_eq!(
            r,
            PixelRect {
                x: 0,
                y: 10,
                width: 100,
                height: 70
            }
        );
    }

    #[test]
    fn test_pixel_rect_outside_frame_is_none() {
        let b = BoundingBox::new(150.0, 150.0, 200.0, 200.0);
        assert!(b.to_pixel_rect(100, 100).is_none());
    }
}
