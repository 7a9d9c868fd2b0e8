use crate::shared::frame::Frame;

use super::face_landmarks::LandmarkSet;

/// Domain interface for facial landmark detection.
///
/// Returns zero or more faces per frame. Implementations may keep state
/// across frames, hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>>;
}
