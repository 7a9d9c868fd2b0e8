use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::shared::pose_angle::PoseAngle;

use super::domain::dispatch_error::DispatchError;
use super::domain::enrollment_service::{CaptureSubmission, EnrollmentService};
use super::domain::recognition_service::{BatchSubmission, RecognitionResult, RecognitionService};

/// Identifies which session and attempt a dispatch belongs to.
///
/// `generation` changes on every session start and stop, so a result that
/// arrives after teardown or restart no longer matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DispatchTicket {
    pub generation: u64,
    pub attempt: u64,
    pub angle: Option<PoseAngle>,
}

#[derive(Debug)]
pub enum DispatchResult {
    Capture(Result<(), DispatchError>),
    Batch(Result<Vec<RecognitionResult>, DispatchError>),
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub ticket: DispatchTicket,
    pub elapsed: Duration,
    pub result: DispatchResult,
}

/// Runs submissions off the frame loop and hands results back to it.
///
/// Each submission gets its own worker thread; the frame loop never waits
/// on the network. Outcomes queue on a channel until the loop drains them
/// with [`try_drain`](Self::try_drain).
pub struct DispatchClient {
    tx: Sender<DispatchOutcome>,
    rx: Receiver<DispatchOutcome>,
    in_flight: Arc<AtomicUsize>,
}

impl DispatchClient {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn submit_capture(
        &self,
        service: Arc<dyn EnrollmentService>,
        ticket: DispatchTicket,
        submission: CaptureSubmission,
    ) {
        self.spawn(ticket, move || {
            DispatchResult::Capture(service.submit_capture(&submission))
        });
    }

    pub fn submit_batch(
        &self,
        service: Arc<dyn RecognitionService>,
        ticket: DispatchTicket,
        batch: BatchSubmission,
    ) {
        self.spawn(ticket, move || DispatchResult::Batch(service.submit_batch(&batch)));
    }

    /// Number of dispatches whose outcome has not been delivered yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Everything that has completed so far, without blocking.
    pub fn try_drain(&self) -> Vec<DispatchOutcome> {
        self.rx.try_iter().collect()
    }

    /// Blocks for the next outcome, up to `timeout`.
    pub fn wait_one(&self, timeout: Duration) -> Option<DispatchOutcome> {
        self.rx.recv_timeout(timeout).ok()
    }

    fn spawn<F>(&self, ticket: DispatchTicket, work: F)
    where
        F: FnOnce() -> DispatchResult + Send + 'static,
    {
        let tx = self.tx.clone();
        let in_flight = self.in_flight.clone();
        in_flight.fetch_add(1, Ordering::AcqRel);

        thread::spawn(move || {
            let started = Instant::now();
            let result = work();
            let outcome = DispatchOutcome {
                ticket,
                elapsed: started.elapsed(),
                result,
            };
            // Decrement first so a receiver that sees the outcome also sees
            // the updated count.
            in_flight.fetch_sub(1, Ordering::AcqRel);
            if tx.send(outcome).is_err() {
                log::debug!("dispatch {ticket:?} finished after its session was dropped");
            }
        });
    }
}

impl Default for DispatchClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::enrollment_form::EnrollmentForm;
    use crate::shared::frame::Frame;
    use std::sync::Mutex;

    const WAIT: Duration = Duration::from_secs(5);

    struct RecordingEnrollment {
        angles: Mutex<Vec<PoseAngle>>,
        fail: bool,
    }

    impl EnrollmentService for RecordingEnrollment {
        fn submit_capture(&self, submission: &CaptureSubmission) -> Result<(), DispatchError> {
            self.angles.lock().unwrap().push(submission.angle);
            if self.fail {
                Err(DispatchError::Status {
                    status: 500,
                    body: String::new(),
                })
            } else {
                Ok(())
            }
        }
    }

    struct FixedRecognition;

    impl RecognitionService for FixedRecognition {
        fn submit_batch(
            &self,
            batch: &BatchSubmission,
        ) -> Result<Vec<RecognitionResult>, DispatchError> {
            Ok(batch
                .images
                .iter()
                .enumerate()
                .map(|(i, _)| RecognitionResult {
                    identity: format!("S-{i}"),
                    status: "present".into(),
                    timestamp: "2026-01-01T08:00:00Z".into(),
                })
                .collect())
        }
    }

    fn ticket(attempt: u64, angle: Option<PoseAngle>) -> DispatchTicket {
        DispatchTicket {
            generation: 1,
            attempt,
            angle,
        }
    }

    fn submission(angle: PoseAngle) -> CaptureSubmission {
        CaptureSubmission {
            identity: EnrollmentForm::new("S-1", "A", "B", "C"),
            image: Frame::new(vec![0; 12], 2, 2, 3, 0),
            angle,
        }
    }

    #[test]
    fn test_capture_outcome_carries_ticket() {
        let service = Arc::new(RecordingEnrollment {
            angles: Mutex::new(Vec::new()),
            fail: false,
        });
        let client = DispatchClient::new();
        let t = ticket(7, Some(PoseAngle::Up));
        client.submit_capture(service.clone(), t, submission(PoseAngle::Up));

        let outcome = client.wait_one(WAIT).unwrap();
        assert_eq!(outcome.ticket, t);
        assert!(matches!(outcome.result, DispatchResult::Capture(Ok(()))));
        assert_eq!(*service.angles.lock().unwrap(), vec![PoseAngle::Up]);
        assert_eq!(client.in_flight(), 0);
    }

    #[test]
    fn test_failure_is_delivered_not_raised() {
        let service = Arc::new(RecordingEnrollment {
            angles: Mutex::new(Vec::new()),
            fail: true,
        });
        let client = DispatchClient::new();
        client.submit_capture(service, ticket(1, Some(PoseAngle::Front)), submission(PoseAngle::Front));

        let outcome = client.wait_one(WAIT).unwrap();
        assert!(matches!(
            outcome.result,
            DispatchResult::Capture(Err(DispatchError::Status { status: 500, .. }))
        ));
    }

    #[test]
    fn test_batch_outcome() {
        let client = DispatchClient::new();
        let batch = BatchSubmission {
            images: vec![Frame::new(vec![0; 3], 1, 1, 3, 0); 2],
            session_id: "room-1".into(),
            context: None,
        };
        client.submit_batch(Arc::new(FixedRecognition), ticket(1, None), batch);

        let outcome = client.wait_one(WAIT).unwrap();
        match outcome.result {
            DispatchResult::Batch(Ok(results)) => assert_eq!(results.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_try_drain_is_non_blocking() {
        let client = DispatchClient::new();
        assert!(client.try_drain().is_empty());
        assert!(client.wait_one(Duration::from_millis(10)).is_none());
    }
}
