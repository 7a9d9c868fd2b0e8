use std::path::PathBuf;

/// Describes a frame source once it has been opened.
///
/// `fps` is 0 for sources without a native rate (still-image sequences);
/// `total_frames` is 0 when unknown, e.g. for a live device.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

impl SourceMetadata {
    /// Wall-clock spacing between frames, if the source has a rate.
    pub fn frame_interval(&self) -> Option<std::time::Duration> {
        (self.fps > 0.0).then(|| std::time::Duration::from_secs_f64(1.0 / self.fps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn meta(fps: f64) -> SourceMetadata {
        SourceMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames: 0,
            source_path: None,
        }
    }

    #[test]
    fn test_frame_interval_from_fps() {
        let interval = meta(25.0).frame_interval().unwrap();
        assert_eq!(interval, Duration::from_millis(40));
    }

    #[test]
    fn test_no_interval_without_rate() {
        assert!(meta(0.0).frame_interval().is_none());
    }
}
