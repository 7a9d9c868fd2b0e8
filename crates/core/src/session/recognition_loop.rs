use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detection::domain::face_landmarks::LandmarkSet;
use crate::detection::domain::pose_classifier::PoseClassifier;
use crate::dispatch::dispatch_client::{
    DispatchClient, DispatchOutcome, DispatchResult, DispatchTicket,
};
use crate::dispatch::domain::recognition_service::{BatchSubmission, RecognitionService};
use crate::shared::capture_config::CaptureConfig;
use crate::shared::frame::Frame;

use super::frame_loop::FrameConsumer;
use super::rate_limiter::RateLimiter;
use super::session_events::{SessionEvent, SessionObserver};
use super::session_logger::SessionLogger;

/// What happened to the batch assembled from one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    Empty,
    Sent(usize),
    /// Inside the throttle window; the crops were discarded.
    RateLimited(usize),
}

/// Crops every acceptable face in each frame and sends the crops for
/// recognition, at most once per configured interval.
///
/// Has no terminal state. Results are display-only and never feed back
/// into what gets sent.
pub struct RecognitionLoop {
    classifier: PoseClassifier,
    limiter: RateLimiter,
    crop_size: u32,
    crop_padding: f64,
    session_id: String,
    context: Option<String>,
    service: Arc<dyn RecognitionService>,
    dispatcher: DispatchClient,
    observer: Box<dyn SessionObserver>,
    logger: Box<dyn SessionLogger>,
    active: bool,
    generation: u64,
    next_attempt: u64,
    pending: usize,
}

impl RecognitionLoop {
    pub fn new(
        config: &CaptureConfig,
        session_id: impl Into<String>,
        context: Option<String>,
        service: Arc<dyn RecognitionService>,
        observer: Box<dyn SessionObserver>,
        logger: Box<dyn SessionLogger>,
    ) -> Self {
        Self {
            classifier: PoseClassifier::from_config(config),
            limiter: RateLimiter::new(config.recognition_interval()),
            crop_size: config.crop_size,
            crop_padding: config.crop_padding,
            session_id: session_id.into(),
            context,
            service,
            dispatcher: DispatchClient::new(),
            observer,
            logger,
            active: true,
            generation: 1,
            next_attempt: 0,
            pending: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending_batches(&self) -> usize {
        self.pending
    }

    /// Padded, square-resized crops of every face large enough to trust.
    pub fn collect_crops(&self, frame: &Frame, faces: &[LandmarkSet]) -> Vec<Frame> {
        faces
            .iter()
            .filter_map(|face| self.classifier.accepted_box(face))
            .filter_map(|bbox| {
                let rect = bbox
                    .padded(self.crop_padding)
                    .to_pixel_rect(frame.width(), frame.height())?;
                let crop = frame.crop(rect).resized(self.crop_size, self.crop_size);
                if crop.is_none() {
                    log::debug!("Skipping face crop from {}-channel frame", frame.channels());
                }
                crop
            })
            .collect()
    }

    pub fn process_frame(&mut self, frame: &Frame, faces: &[LandmarkSet], now: Instant) -> BatchOutcome {
        self.poll_dispatches();
        if !self.active {
            return BatchOutcome::Empty;
        }

        let crops = self.collect_crops(frame, faces);
        self.logger.metric("faces", crops.len() as f64);
        if crops.is_empty() {
            return BatchOutcome::Empty;
        }

        let n = crops.len();
        if !self.limiter.try_acquire(now) {
            self.logger.count("rate_limited");
            return BatchOutcome::RateLimited(n);
        }

        self.next_attempt += 1;
        let ticket = DispatchTicket {
            generation: self.generation,
            attempt: self.next_attempt,
            angle: None,
        };
        let batch = BatchSubmission {
            images: crops,
            session_id: self.session_id.clone(),
            context: self.context.clone(),
        };
        self.pending += 1;
        self.logger.count("batches_sent");
        self.dispatcher
            .submit_batch(self.service.clone(), ticket, batch);
        BatchOutcome::Sent(n)
    }

    pub fn poll_dispatches(&mut self) {
        for outcome in self.dispatcher.try_drain() {
            self.apply_outcome(outcome);
        }
    }

    /// Blocks until outstanding batches resolve or `timeout` passes.
    pub fn wait_for_pending(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        while self.pending > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            match self.dispatcher.wait_one(left) {
                Some(outcome) => self.apply_outcome(outcome),
                None => break,
            }
        }
        self.pending
    }

    /// Stops sending. Replies to batches already sent are dropped.
    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.generation += 1;
            self.pending = 0;
            self.logger.info("Recognition stopped");
        }
    }

    fn apply_outcome(&mut self, outcome: DispatchOutcome) {
        if !self.active || outcome.ticket.generation != self.generation {
            self.logger.count("stale_outcomes");
            return;
        }
        self.pending = self.pending.saturating_sub(1);
        self.logger
            .timing("dispatch", outcome.elapsed.as_secs_f64() * 1000.0);

        let DispatchResult::Batch(result) = outcome.result else {
            return;
        };
        match result {
            Ok(results) => self
                .observer
                .notify(&SessionEvent::RecognitionResults(results)),
            Err(error) => {
                self.logger.count("dispatch_failures");
                self.observer
                    .notify(&SessionEvent::from_dispatch_error(None, error));
            }
        }
    }
}

impl FrameConsumer for RecognitionLoop {
    fn on_frame(&mut self, frame: &Frame, faces: &[LandmarkSet], now: Instant) {
        self.process_frame(frame, faces, now);
    }

    fn drain(&mut self, timeout: Duration) {
        self.wait_for_pending(timeout);
    }

    fn stop(&mut self) {
        RecognitionLoop::stop(self);
    }

    fn logger(&mut self) -> &mut dyn SessionLogger {
        self.logger.as_mut()
    }
}
