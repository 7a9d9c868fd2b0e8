//! 5-point face landmarks and the ratios the pose classifier reads from them.
//!
//! Point order: left eye, right eye, nose, left mouth corner, right mouth
//! corner, where "left" means smaller x in the image.

use crate::shared::bounding_box::BoundingBox;

const LEFT_EYE: usize = 0;
const RIGHT_EYE: usize = 1;
const NOSE: usize = 2;
const LEFT_MOUTH: usize = 3;
const RIGHT_MOUTH: usize = 4;

/// Eye spans below this many pixels are treated as degenerate.
const MIN_EYE_DISTANCE: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    /// Points with x <= 0 are treated as invisible.
    points: [(f64, f64); 5],
    face_box: BoundingBox,
}

impl LandmarkSet {
    pub fn new(points: [(f64, f64); 5], face_box: BoundingBox) -> Self {
        Self { points, face_box }
    }

    /// Builds a set whose face box is the hull of the visible points.
    pub fn from_points(points: [(f64, f64); 5]) -> Option<Self> {
        let visible: Vec<(f64, f64)> = points.iter().copied().filter(|p| p.0 > 0.0).collect();
        let face_box = BoundingBox::enclosing(&visible)?;
        Some(Self::new(points, face_box))
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    pub fn face_box(&self) -> &BoundingBox {
        &self.face_box
    }

    /// All five landmarks are visible.
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(|(x, _)| *x > 0.0)
    }

    pub fn eye_distance(&self) -> f64 {
        let (lx, ly) = self.points[LEFT_EYE];
        let (rx, ry) = self.points[RIGHT_EYE];
        (rx - lx).hypot(ry - ly)
    }

    /// `(nose_x - left_eye_x) / eye_distance`: ~0.5 facing the camera,
    /// smaller when the nose swings toward the left eye.
    pub fn nose_position(&self) -> Option<f64> {
        if !self.is_complete() {
            return None;
        }
        let eye_distance = self.eye_distance();
        if eye_distance < MIN_EYE_DISTANCE {
            return None;
        }
        Some((self.points[NOSE].0 - self.points[LEFT_EYE].0) / eye_distance)
    }

    /// `(nose_y - eye_mid_y) / (mouth_y - nose_y)`: grows when the head
    /// tilts down, shrinks when it tilts up.
    pub fn up_down_ratio(&self) -> Option<f64> {
        if !self.is_complete() {
            return None;
        }
        let eye_mid_y = (self.points[LEFT_EYE].1 + self.points[RIGHT_EYE].1) / 2.0;
        let mouth_y = (self.points[LEFT_MOUTH].1 + self.points[RIGHT_MOUTH].1) / 2.0;
        let nose_y = self.points[NOSE].1;

        let lower = mouth_y - nose_y;
        if lower <= 0.0 {
            return None;
        }
        Some((nose_y - eye_mid_y) / lower)
    }
}
