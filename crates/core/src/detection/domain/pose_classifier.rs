use crate::shared::bounding_box::BoundingBox;
use crate::shared::capture_config::{CaptureConfig, PoseThresholds};
use crate::shared::pose_angle::PoseAngle;

use super::face_landmarks::LandmarkSet;

/// Result of classifying one face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Classification {
    /// Face box below the minimum size; the frame is skipped.
    TooSmall(BoundingBox),
    /// Landmarks missing or degenerate; treated like `TooSmall`.
    Indeterminate(BoundingBox),
    Pose { angle: PoseAngle, bbox: BoundingBox },
}

impl Classification {
    pub fn angle(&self) -> Option<PoseAngle> {
        match self {
            Classification::Pose { angle, .. } => Some(*angle),
            _ => None,
        }
    }

    pub fn bbox(&self) -> &BoundingBox {
        match self {
            Classification::TooSmall(b) | Classification::Indeterminate(b) => b,
            Classification::Pose { bbox, .. } => bbox,
        }
    }
}

/// Maps landmark geometry to a discrete head pose.
///
/// Horizontal turns take precedence over vertical tilts: a face that is
/// both turned and tilted reports the turn.
#[derive(Clone, Debug)]
pub struct PoseClassifier {
    thresholds: PoseThresholds,
    min_face_size: f64,
}

impl PoseClassifier {
    pub fn new(thresholds: PoseThresholds, min_face_size: f64) -> Self {
        Self {
            thresholds,
            min_face_size,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.pose, config.min_face_size)
    }

    /// Face box if it is large enough to be trusted.
    pub fn accepted_box(&self, landmarks: &LandmarkSet) -> Option<BoundingBox> {
        let bbox = *landmarks.face_box();
        bbox.is_at_least(self.min_face_size).then_some(bbox)
    }

    pub fn classify(&self, landmarks: &LandmarkSet) -> Classification {
        let Some(bbox) = self.accepted_box(landmarks) else {
            return Classification::TooSmall(*landmarks.face_box());
        };
        let (Some(nose_pos), Some(up_down)) =
            (landmarks.nose_position(), landmarks.up_down_ratio())
        else {
            return Classification::Indeterminate(bbox);
        };

        let t = &self.thresholds;
        let angle = if nose_pos < t.right_below {
            PoseAngle::Right
        } else if nose_pos > t.left_above {
            PoseAngle::Left
        } else if up_down > t.down_above {
            PoseAngle::Down
        } else if up_down < t.up_below {
            PoseAngle::Up
        } else {
            PoseAngle::Front
        };
        Classification::Pose { angle, bbox }
    }

    /// Single-face mode: the face with the largest box wins.
    pub fn primary_face<'a>(&self, faces: &'a [LandmarkSet]) -> Option<&'a LandmarkSet> {
        faces.iter().max_by(|a, b| {
            a.face_box()
                .area()
                .partial_cmp(&b.face_box().area())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

impl Default for PoseClassifier {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}
