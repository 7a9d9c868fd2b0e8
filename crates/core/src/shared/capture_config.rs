//! Tunables shared by enrollment and live recognition.
//!
//! Every empirical threshold lives here so the two modes read the same
//! values. Files are JSON; missing fields fall back to the defaults.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pose_angle::PoseAngle;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Ratio cut-offs for the landmark pose classifier.
///
/// `nose_position` is the nose's offset from the left eye in units of eye
/// distance; `up_down_ratio` is the nose-below-eyes span over the
/// mouth-below-nose span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseThresholds {
    pub right_below: f64,
    pub left_above: f64,
    pub down_above: f64,
    pub up_below: f64,
}

impl Default for PoseThresholds {
    fn default() -> Self {
        Self {
            right_below: 0.35,
            left_above: 0.75,
            down_above: 1.4,
            up_below: 0.55,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub pose: PoseThresholds,

    /// Smallest face box side, in pixels, that is classified at all.
    pub min_face_size: f64,

    /// Consecutive identical classifications before a pose counts as stable.
    pub stability_frames: u32,

    /// Stability requirement for `down`, which is the noisiest pose.
    pub down_stability_frames: u32,

    /// Minimum run length the capture gate accepts on a stability event.
    pub stability_floor: u32,

    /// Consecutive face-less frames tolerated before detection state resets.
    pub absence_reset_frames: u32,

    /// How long an admitted capture blocks further captures.
    pub lock_duration_ms: u64,

    /// Minimum spacing between live recognition batches.
    pub recognition_interval_ms: u64,

    /// Side length of the square crops sent for recognition.
    pub crop_size: u32,

    /// Fraction of the face box added on each side before cropping.
    pub crop_padding: f64,

    /// Angles an enrollment session must capture, in order.
    pub angle_sequence: Vec<PoseAngle>,

    /// Per-request HTTP timeout for both services.
    pub request_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pose: PoseThresholds::default(),
            min_face_size: 80.0,
            stability_frames: 12,
            down_stability_frames: 18,
            stability_floor: 3,
            absence_reset_frames: 25,
            lock_duration_ms: 1200,
            recognition_interval_ms: 1000,
            crop_size: 128,
            crop_padding: 0.2,
            angle_sequence: PoseAngle::ALL.to_vec(),
            request_timeout_ms: 10_000,
        }
    }
}

impl CaptureConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: CaptureConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.stability_frames == 0 || self.down_stability_frames == 0 {
            return invalid("stability frame counts must be at least 1".into());
        }
        let min_required = self.stability_frames.min(self.down_stability_frames);
        if self.stability_floor > min_required {
            return invalid(format!(
                "stability_floor ({}) exceeds the stability requirement ({min_required})",
                self.stability_floor
            ));
        }
        if self.absence_reset_frames == 0 {
            return invalid("absence_reset_frames must be at least 1".into());
        }
        if self.angle_sequence.is_empty() {
            return invalid("angle_sequence must not be empty".into());
        }
        let unique: HashSet<_> = self.angle_sequence.iter().collect();
        if unique.len() != self.angle_sequence.len() {
            return invalid("angle_sequence must not repeat an angle".into());
        }
        if self.pose.right_below >= self.pose.left_above {
            return invalid("pose.right_below must be below pose.left_above".into());
        }
        if self.pose.up_below >= self.pose.down_above {
            return invalid("pose.up_below must be below pose.down_above".into());
        }
        if self.min_face_size < 0.0 || self.crop_padding < 0.0 {
            return invalid("min_face_size and crop_padding must not be negative".into());
        }
        if self.crop_size == 0 {
            return invalid("crop_size must be at least 1".into());
        }
        Ok(())
    }

    pub fn lock_duration(&self) -> Duration {
        Duration::from_millis(self.lock_duration_ms)
    }

    pub fn recognition_interval(&self) -> Duration {
        Duration::from_millis(self.recognition_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let c = CaptureConfig::default();
        assert_relative_eq!(c.pose.right_below, 0.35);
        assert_relative_eq!(c.pose.left_above, 0.75);
        assert_relative_eq!(c.pose.down_above, 1.4);
        assert_relative_eq!(c.pose.up_below, 0.55);
        assert_eq!(c.stability_frames, 12);
        assert_eq!(c.down_stability_frames, 18);
        assert_eq!(c.stability_floor, 3);
        assert_eq!(c.absence_reset_frames, 25);
        assert_eq!(c.lock_duration(), Duration::from_millis(1200));
        assert_eq!(c.recognition_interval(), Duration::from_millis(1000));
        assert_eq!(c.crop_size, 128);
        assert_eq!(c.angle_sequence, PoseAngle::ALL.to_vec());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("capture.json");
        fs::write(
            &path,
            r#"{ "stability_frames": 8, "pose": { "left_above": 0.8 } }"#,
        )
        .unwrap();

        let c = CaptureConfig::load(&path).unwrap();
        assert_eq!(c.stability_frames, 8);
        assert_relative_eq!(c.pose.left_above, 0.8);
        assert_relative_eq!(c.pose.right_below, 0.35);
        assert_eq!(c.down_stability_frames, 18);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = CaptureConfig::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let err = CaptureConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("invalid.json");
        fs::write(&path, r#"{ "stability_frames": 0 }"#).unwrap();
        let err = CaptureConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_floor_above_threshold() {
        let c = CaptureConfig {
            stability_floor: 13,
            ..CaptureConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_angles() {
        let c = CaptureConfig {
            angle_sequence: vec![PoseAngle::Front, PoseAngle::Left, PoseAngle::Front],
            ..CaptureConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_sequence() {
        let c = CaptureConfig {
            angle_sequence: Vec::new(),
            ..CaptureConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let c = CaptureConfig {
            pose: PoseThresholds {
                right_below: 0.8,
                ..PoseThresholds::default()
            },
            ..CaptureConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_round_trips_through_json() {
        let c = CaptureConfig::default();
        let json = serde_json::to_string_pretty(&c).unwrap();
        assert!(json.contains("\"angle_sequence\""));
        assert!(json.contains("\"front\""));
    }
}
