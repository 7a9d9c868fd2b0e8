use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discrete head orientation derived from facial landmark geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseAngle {
    Front,
    Left,
    Right,
    Up,
    Down,
}

impl PoseAngle {
    /// Enrollment order: every session walks these in sequence.
    pub const ALL: [PoseAngle; 5] = [
        PoseAngle::Front,
        PoseAngle::Left,
        PoseAngle::Right,
        PoseAngle::Up,
        PoseAngle::Down,
    ];

    /// Wire label sent to the enrollment service.
    pub fn label(self) -> &'static str {
        match self {
            PoseAngle::Front => "front",
            PoseAngle::Left => "left",
            PoseAngle::Right => "right",
            PoseAngle::Up => "up",
            PoseAngle::Down => "down",
        }
    }
}

impl fmt::Display for PoseAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PoseAngle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(PoseAngle::Front),
            "left" => Ok(PoseAngle::Left),
            "right" => Ok(PoseAngle::Right),
            "up" => Ok(PoseAngle::Up),
            "down" => Ok(PoseAngle::Down),
            other => Err(format!("unknown pose angle: {other}")),
        }
    }
}
