use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::capture::domain::capture_gate::{CaptureGate, GateDecision, GateInputs};
use crate::capture::domain::enrollment_form::EnrollmentForm;
use crate::capture::domain::enrollment_sequencer::{
    Advance, AngleStatus, EnrollmentSequencer, EnrollmentState,
};
use crate::capture::domain::stability_debouncer::StabilityDebouncer;
use crate::detection::domain::face_landmarks::LandmarkSet;
use crate::detection::domain::pose_classifier::{Classification, PoseClassifier};
use crate::dispatch::dispatch_client::{
    DispatchClient, DispatchOutcome, DispatchResult, DispatchTicket,
};
use crate::dispatch::domain::enrollment_service::{CaptureSubmission, EnrollmentService};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::capture_config::CaptureConfig;
use crate::shared::frame::Frame;
use crate::shared::pose_angle::PoseAngle;

use super::frame_loop::FrameConsumer;
use super::session_events::{Overlay, OverlayFn, SessionEvent, SessionObserver};
use super::session_logger::SessionLogger;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("identity incomplete, missing: {}", .missing.join(", "))]
    IdentityIncomplete { missing: Vec<&'static str> },
    #[error("an enrollment session is already capturing")]
    AlreadyRunning,
    #[error("no angles configured")]
    EmptySequence,
}

/// What happened to one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The session is not running.
    Idle,
    NoFace,
    /// Face too small or landmarks unusable; the frame is skipped.
    TooSmall,
    Classified { angle: PoseAngle, dispatched: bool },
}

/// One enrollment run for one identity.
///
/// The frame loop is the only writer. Dispatch results come back over the
/// [`DispatchClient`] channel and are applied at the start of the next
/// frame, after checking they belong to the current run and target.
pub struct EnrollmentSession {
    identity: EnrollmentForm,
    classifier: PoseClassifier,
    debouncer: StabilityDebouncer,
    gate: CaptureGate,
    sequencer: EnrollmentSequencer,
    service: Arc<dyn EnrollmentService>,
    dispatcher: DispatchClient,
    observer: Box<dyn SessionObserver>,
    logger: Box<dyn SessionLogger>,
    overlay: Option<OverlayFn>,
    active: bool,
    generation: u64,
    next_attempt: u64,
    face_detected: bool,
    /// Angle admitted most recently; cleared when the user looks away from
    /// the target or the attempt fails.
    attempted: Option<PoseAngle>,
    /// Unresolved dispatches of the current generation, by attempt.
    pending: HashMap<u64, PoseAngle>,
}

impl EnrollmentSession {
    pub fn new(
        config: &CaptureConfig,
        identity: EnrollmentForm,
        service: Arc<dyn EnrollmentService>,
        observer: Box<dyn SessionObserver>,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            identity,
            classifier: PoseClassifier::from_config(config),
            debouncer: StabilityDebouncer::from_config(config),
            gate: CaptureGate::from_config(config),
            sequencer: EnrollmentSequencer::new(config.angle_sequence.clone()),
            service,
            dispatcher: DispatchClient::new(),
            observer,
            logger,
            overlay: None,
            active: false,
            generation: 0,
            next_attempt: 0,
            face_detected: false,
            attempted: None,
            pending: HashMap::new(),
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayFn) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn state(&self) -> EnrollmentState {
        self.sequencer.state()
    }

    pub fn target(&self) -> Option<PoseAngle> {
        self.sequencer.target()
    }

    pub fn status(&self) -> &AngleStatus {
        self.sequencer.status()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_complete(&self) -> bool {
        self.sequencer.is_complete()
    }

    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn identity(&self) -> &EnrollmentForm {
        &self.identity
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_dispatches(&self) -> usize {
        self.pending.len()
    }

    /// Replaces the identity fields. Takes effect at the next admission.
    pub fn update_identity(&mut self, identity: EnrollmentForm) {
        self.identity = identity;
    }

    /// Begins a new run from the first angle with every status cleared.
    ///
    /// Allowed when idle, stopped, or after completion.
    pub fn start(&mut self) -> Result<PoseAngle, StartError> {
        if self.active && !self.sequencer.is_complete() {
            return Err(StartError::AlreadyRunning);
        }
        let missing = self.identity.missing_fields();
        if !missing.is_empty() {
            self.observer.notify(&SessionEvent::IdentityIncomplete {
                missing: missing.clone(),
            });
            return Err(StartError::IdentityIncomplete { missing });
        }
        let first = self.sequencer.start().ok_or(StartError::EmptySequence)?;

        self.generation += 1;
        self.active = true;
        self.reset_tracking();
        self.logger.info(&format!(
            "Enrollment started for {} (run {})",
            self.identity.subject_id, self.generation
        ));
        self.observer.notify(&SessionEvent::TargetChanged(first));
        Ok(first)
    }

    /// Tears the run down. Dispatches already sent keep running, but their
    /// results will be discarded.
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.generation += 1;
        self.reset_tracking();
        self.logger.info("Enrollment stopped");
    }

    fn reset_tracking(&mut self) {
        self.debouncer.reset();
        self.gate.reset();
        self.pending.clear();
        self.attempted = None;
        self.face_detected = false;
    }

    pub fn process_frame(
        &mut self,
        frame: &Frame,
        faces: &[LandmarkSet],
        now: Instant,
    ) -> FrameOutcome {
        self.poll_dispatches();
        if !self.active {
            return FrameOutcome::Idle;
        }

        let target = self.sequencer.target();
        let Some(face) = self.classifier.primary_face(faces) else {
            if self.debouncer.observe_absent() {
                self.set_face_detected(false);
            }
            self.emit_overlay(frame, None, None, target);
            return FrameOutcome::NoFace;
        };

        let started = Instant::now();
        let classification = self.classifier.classify(face);
        self.logger
            .timing("classify", started.elapsed().as_secs_f64() * 1000.0);

        let Classification::Pose { angle, bbox } = classification else {
            self.emit_overlay(frame, Some(*classification.bbox()), None, target);
            return FrameOutcome::TooSmall;
        };
        self.set_face_detected(true);
        self.emit_overlay(frame, Some(bbox), Some(angle), target);

        if target != Some(angle) {
            self.attempted = None;
        }

        let Some(event) = self.debouncer.observe(angle) else {
            return FrameOutcome::Classified {
                angle,
                dispatched: false,
            };
        };

        let inputs = GateInputs {
            event,
            face_detected: self.face_detected,
            target,
            already_captured: self.sequencer.status().is_captured(event.angle),
            already_attempted: self.attempted == Some(event.angle),
            in_flight: self.pending.values().any(|a| *a == event.angle),
            identity_complete: self.identity.is_complete(),
        };
        let dispatched = match self.gate.evaluate(&inputs, now) {
            GateDecision::Admit => {
                self.dispatch(frame, event.angle);
                true
            }
            GateDecision::Reject(reason) => {
                log::debug!(
                    "{} stable for {} frames, not captured: {reason:?}",
                    event.angle,
                    event.count
                );
                if reason.is_user_visible() {
                    self.observer.notify(&SessionEvent::IdentityIncomplete {
                        missing: self.identity.missing_fields(),
                    });
                }
                false
            }
        };
        FrameOutcome::Classified { angle, dispatched }
    }

    fn dispatch(&mut self, frame: &Frame, angle: PoseAngle) {
        self.next_attempt += 1;
        let ticket = DispatchTicket {
            generation: self.generation,
            attempt: self.next_attempt,
            angle: Some(angle),
        };
        self.pending.insert(ticket.attempt, angle);
        self.attempted = Some(angle);
        self.logger.count("dispatches");
        log::info!("Submitting {angle} capture (attempt {})", ticket.attempt);

        let submission = CaptureSubmission {
            identity: self.identity.clone(),
            image: frame.clone(),
            angle,
        };
        self.dispatcher
            .submit_capture(self.service.clone(), ticket, submission);
    }

    /// Applies every dispatch result that has arrived, without blocking.
    pub fn poll_dispatches(&mut self) {
        for outcome in self.dispatcher.try_drain() {
            self.apply_outcome(outcome);
        }
    }

    /// Blocks until this run's dispatches resolve or `timeout` passes.
    /// Returns how many are still unresolved.
    pub fn wait_for_pending(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        while !self.pending.is_empty() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self.dispatcher.wait_one(left) {
                Some(outcome) => self.apply_outcome(outcome),
                None => break,
            }
        }
        self.pending.len()
    }

    pub(crate) fn apply_outcome(&mut self, outcome: DispatchOutcome) {
        let ticket = outcome.ticket;
        if !self.active || ticket.generation != self.generation {
            log::debug!("Discarding result of attempt {} from an earlier run", ticket.attempt);
            self.logger.count("stale_outcomes");
            return;
        }
        self.pending.remove(&ticket.attempt);
        self.logger
            .timing("dispatch", outcome.elapsed.as_secs_f64() * 1000.0);

        let (DispatchResult::Capture(result), Some(angle)) = (outcome.result, ticket.angle) else {
            return;
        };
        match result {
            Ok(()) => self.confirm(angle),
            Err(error) => {
                log::warn!("Capture of {angle} failed: {error}");
                self.logger.count("dispatch_failures");
                if self.attempted == Some(angle) {
                    self.attempted = None;
                }
                self.observer
                    .notify(&SessionEvent::from_dispatch_error(Some(angle), error));
            }
        }
    }

    fn confirm(&mut self, angle: PoseAngle) {
        match self.sequencer.confirm(angle) {
            Some(Advance::Next(next)) => {
                self.observer.notify(&SessionEvent::AngleCaptured(angle));
                self.observer.notify(&SessionEvent::TargetChanged(next));
            }
            Some(Advance::Complete) => {
                self.observer.notify(&SessionEvent::AngleCaptured(angle));
                self.observer.notify(&SessionEvent::SessionComplete);
                self.logger.info(&format!(
                    "Enrollment complete for {}",
                    self.identity.subject_id
                ));
            }
            None => {
                log::debug!("Ignoring success for {angle}: no longer the target");
                self.logger.count("stale_outcomes");
            }
        }
    }

    fn set_face_detected(&mut self, detected: bool) {
        if self.face_detected != detected {
            self.face_detected = detected;
            self.observer.notify(&SessionEvent::FaceDetected(detected));
        }
    }

    fn emit_overlay(
        &mut self,
        frame: &Frame,
        bbox: Option<BoundingBox>,
        angle: Option<PoseAngle>,
        target: Option<PoseAngle>,
    ) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay(&Overlay {
                frame_index: frame.index(),
                bbox,
                angle,
                target,
            });
        }
    }
}

impl FrameConsumer for EnrollmentSession {
    fn on_frame(&mut self, frame: &Frame, faces: &[LandmarkSet], now: Instant) {
        self.process_frame(frame, faces, now);
    }

    fn is_done(&self) -> bool {
        self.is_complete()
    }

    fn drain(&mut self, timeout: Duration) {
        let left = self.wait_for_pending(timeout);
        if left > 0 {
            log::warn!("{left} capture(s) still unresolved at shutdown");
        }
    }

    fn stop(&mut self) {
        EnrollmentSession::stop(self);
    }

    fn logger(&mut self) -> &mut dyn SessionLogger {
        self.logger.as_mut()
    }
}
