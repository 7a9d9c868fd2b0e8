use crossbeam_channel::{Receiver, Sender};

use crate::dispatch::domain::dispatch_error::DispatchError;
use crate::dispatch::domain::recognition_service::RecognitionResult;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::pose_angle::PoseAngle;

/// Status notifications for whatever presents a session to the user.
///
/// `angle` is `None` on dispatch events from live recognition.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    FaceDetected(bool),
    AngleCaptured(PoseAngle),
    TargetChanged(PoseAngle),
    SessionComplete,
    IdentityIncomplete { missing: Vec<&'static str> },
    DispatchFailed {
        angle: Option<PoseAngle>,
        error: DispatchError,
    },
    UnexpectedResponse {
        angle: Option<PoseAngle>,
        message: String,
    },
    RecognitionResults(Vec<RecognitionResult>),
}

impl SessionEvent {
    pub fn from_dispatch_error(angle: Option<PoseAngle>, error: DispatchError) -> Self {
        match error {
            DispatchError::UnexpectedResponse(message) => {
                SessionEvent::UnexpectedResponse { angle, message }
            }
            error => SessionEvent::DispatchFailed { angle, error },
        }
    }

    pub fn level(&self) -> log::Level {
        match self {
            SessionEvent::DispatchFailed { .. } => log::Level::Error,
            SessionEvent::IdentityIncomplete { .. } | SessionEvent::UnexpectedResponse { .. } => {
                log::Level::Warn
            }
            _ => log::Level::Info,
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::FaceDetected(true) => write!(f, "face detected"),
            SessionEvent::FaceDetected(false) => write!(f, "face lost"),
            SessionEvent::AngleCaptured(angle) => write!(f, "captured {angle}"),
            SessionEvent::TargetChanged(angle) => write!(f, "look {angle}"),
            SessionEvent::SessionComplete => write!(f, "all angles captured"),
            SessionEvent::IdentityIncomplete { missing } => {
                write!(f, "identity incomplete, missing: {}", missing.join(", "))
            }
            SessionEvent::DispatchFailed { angle: Some(a), error } => {
                write!(f, "capture of {a} failed: {error}")
            }
            SessionEvent::DispatchFailed { angle: None, error } => {
                write!(f, "recognition request failed: {error}")
            }
            SessionEvent::UnexpectedResponse { angle, message } => match angle {
                Some(a) => write!(f, "unexpected response for {a}: {message}"),
                None => write!(f, "unexpected recognition response: {message}"),
            },
            SessionEvent::RecognitionResults(results) => {
                write!(f, "{} recognition result(s)", results.len())
            }
        }
    }
}

/// Receives session notifications. Called on the frame-loop thread.
pub trait SessionObserver: Send {
    fn notify(&mut self, event: &SessionEvent);
}

pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn notify(&mut self, _event: &SessionEvent) {}
}

/// Writes each event through the `log` facade at its own level.
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn notify(&mut self, event: &SessionEvent) {
        log::log!(event.level(), "{event}");
        if let SessionEvent::RecognitionResults(results) = event {
            for r in results {
                log::info!("  {} {} {}", r.identity, r.status, r.timestamp);
            }
        }
    }
}

/// Forwards events to another thread, e.g. a UI.
///
/// Events sent after the receiver is dropped are discarded.
pub struct ChannelObserver {
    tx: Sender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn notify(&mut self, event: &SessionEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// What to draw over the current frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Overlay {
    pub frame_index: usize,
    pub bbox: Option<BoundingBox>,
    pub angle: Option<PoseAngle>,
    pub target: Option<PoseAngle>,
}

pub type OverlayFn = Box<dyn FnMut(&Overlay) + Send>;
