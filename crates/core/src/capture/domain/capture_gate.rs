use std::time::{Duration, Instant};

use crate::shared::capture_config::CaptureConfig;
use crate::shared::pose_angle::PoseAngle;

use super::capture_lock::CaptureLock;
use super::stability_debouncer::StabilityEvent;

/// Snapshot of session state the gate judges a stability event against.
#[derive(Clone, Copy, Debug)]
pub struct GateInputs {
    pub event: StabilityEvent,
    pub face_detected: bool,
    /// `None` unless the sequencer is capturing.
    pub target: Option<PoseAngle>,
    pub already_captured: bool,
    /// An attempt for this angle was admitted and the user has not looked
    /// away since.
    pub already_attempted: bool,
    /// A dispatch for this angle is still unresolved.
    pub in_flight: bool,
    pub identity_complete: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateRejection {
    NotCapturing,
    NoFace,
    BelowFloor,
    NotTarget,
    AlreadyCaptured,
    AlreadyAttempted,
    InFlight,
    Locked,
    IdentityIncomplete,
}

impl GateRejection {
    /// Only incomplete identity is reported to the user; every other
    /// rejection is silent.
    pub fn is_user_visible(self) -> bool {
        self == GateRejection::IdentityIncomplete
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Admit,
    Reject(GateRejection),
}

/// Admits at most one capture at a time.
///
/// Admission takes the [`CaptureLock`] before returning, so a second
/// stability event in the same tick, or any event before the lock expires,
/// is refused regardless of angle.
#[derive(Clone, Debug)]
pub struct CaptureGate {
    lock: CaptureLock,
    stability_floor: u32,
}

impl CaptureGate {
    pub fn new(lock_duration: Duration, stability_floor: u32) -> Self {
        Self {
            lock: CaptureLock::new(lock_duration),
            stability_floor,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.lock_duration(), config.stability_floor)
    }

    pub fn is_locked(&self, now: Instant) -> bool {
        self.lock.is_held(now)
    }

    pub fn lock(&self) -> &CaptureLock {
        &self.lock
    }

    pub fn evaluate(&mut self, inputs: &GateInputs, now: Instant) -> GateDecision {
        let rejection = match inputs.target {
            None => Some(GateRejection::NotCapturing),
            Some(_) if !inputs.face_detected => Some(GateRejection::NoFace),
            Some(_) if inputs.event.count < self.stability_floor => Some(GateRejection::BelowFloor),
            Some(target) if inputs.event.angle != target => Some(GateRejection::NotTarget),
            Some(_) if inputs.already_captured => Some(GateRejection::AlreadyCaptured),
            Some(_) if inputs.already_attempted => Some(GateRejection::AlreadyAttempted),
            Some(_) if inputs.in_flight => Some(GateRejection::InFlight),
            Some(_) if self.lock.is_held(now) => Some(GateRejection::Locked),
            Some(_) if !inputs.identity_complete => Some(GateRejection::IdentityIncomplete),
            Some(_) => None,
        };

        if let Some(r) = rejection {
            return GateDecision::Reject(r);
        }
        if !self.lock.try_acquire(now) {
            return GateDecision::Reject(GateRejection::Locked);
        }
        GateDecision::Admit
    }

    pub fn reset(&mut self) {
        self.lock.clear();
    }
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::from_config(&CaptureConfig::default())
    }
}
