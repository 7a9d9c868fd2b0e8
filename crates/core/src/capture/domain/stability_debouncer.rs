use crate::shared::capture_config::CaptureConfig;
use crate::shared::pose_angle::PoseAngle;

/// Emitted when one angle has been seen for its required run of frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilityEvent {
    pub angle: PoseAngle,
    /// Run length at the moment of emission.
    pub count: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StabilityState {
    pub last_angle: Option<PoseAngle>,
    pub consecutive: u32,
}

/// Consecutive-match counter over the per-frame pose stream.
///
/// Any change of angle restarts the run at 1. A run that reaches its
/// threshold emits one event and restarts at 0, whatever the gate then
/// decides. Face-less frames leave the run untouched until
/// `absence_reset_frames` of them arrive in a row.
#[derive(Clone, Debug)]
pub struct StabilityDebouncer {
    state: StabilityState,
    absent_frames: u32,
    stability_frames: u32,
    down_stability_frames: u32,
    absence_reset_frames: u32,
}

impl StabilityDebouncer {
    pub fn new(stability_frames: u32, down_stability_frames: u32, absence_reset_frames: u32) -> Self {
        Self {
            state: StabilityState::default(),
            absent_frames: 0,
            stability_frames,
            down_stability_frames,
            absence_reset_frames,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(
            config.stability_frames,
            config.down_stability_frames,
            config.absence_reset_frames,
        )
    }

    pub fn state(&self) -> StabilityState {
        self.state
    }

    pub fn required_frames(&self, angle: PoseAngle) -> u32 {
        match angle {
            PoseAngle::Down => self.down_stability_frames,
            _ => self.stability_frames,
        }
    }

    pub fn observe(&mut self, angle: PoseAngle) -> Option<StabilityEvent> {
        self.absent_frames = 0;

        if self.state.last_angle == Some(angle) {
            self.state.consecutive += 1;
        } else {
            self.state.last_angle = Some(angle);
            self.state.consecutive = 1;
        }

        if self.state.consecutive < self.required_frames(angle) {
            return None;
        }

        let event = StabilityEvent {
            angle,
            count: self.state.consecutive,
        };
        self.state.consecutive = 0;
        Some(event)
    }

    /// Records a frame with no face. Returns `true` on the frame that
    /// crosses the absence limit and clears the state.
    pub fn observe_absent(&mut self) -> bool {
        self.absent_frames = self.absent_frames.saturating_add(1);
        if self.absent_frames == self.absence_reset_frames {
            self.state = StabilityState::default();
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.state = StabilityState::default();
        self.absent_frames = 0;
    }
}

impl Default for StabilityDebouncer {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}
