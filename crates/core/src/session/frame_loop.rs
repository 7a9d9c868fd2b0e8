use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::detection::domain::face_landmarks::LandmarkSet;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

use super::session_logger::SessionLogger;

/// Something the frame loop feeds: an enrollment session or a
/// recognition loop.
pub trait FrameConsumer {
    fn on_frame(&mut self, frame: &Frame, faces: &[LandmarkSet], now: Instant);

    /// Ends the loop early when true.
    fn is_done(&self) -> bool {
        false
    }

    /// Waits for outstanding dispatches after the source runs dry.
    fn drain(&mut self, timeout: Duration);

    fn stop(&mut self);

    fn logger(&mut self) -> &mut dyn SessionLogger;
}

#[derive(Clone, Debug)]
pub struct LoopOptions {
    /// Sleep between frames to match the source frame rate.
    pub realtime: bool,
    pub drain_timeout: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            realtime: false,
            drain_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The source ran out of frames.
    Exhausted,
    /// The cancel flag was raised.
    Cancelled,
    /// The consumer reported it was done.
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopReport {
    pub frames: usize,
    pub exit: LoopExit,
}

/// Runs frames from `source` through `detector` into `consumer` until the
/// source is exhausted, `cancel` is raised, or the consumer is done.
///
/// The consumer is always stopped and the source always closed before
/// returning, including when decoding or detection fails.
pub fn run_frame_loop(
    source: &mut dyn FrameSource,
    path: &Path,
    detector: &mut dyn LandmarkDetector,
    consumer: &mut dyn FrameConsumer,
    cancel: &AtomicBool,
    options: &LoopOptions,
) -> Result<LoopReport, Box<dyn std::error::Error>> {
    let metadata = source.open(path)?;
    log::info!(
        "Opened {} ({}x{}, {:.1} fps)",
        path.display(),
        metadata.width,
        metadata.height,
        metadata.fps
    );
    let pace = if options.realtime {
        metadata.frame_interval()
    } else {
        None
    };

    let mut frames = 0;
    let mut exit = LoopExit::Exhausted;
    let mut failure: Option<Box<dyn std::error::Error>> = None;

    for item in source.frames() {
        if cancel.load(Ordering::Relaxed) {
            exit = LoopExit::Cancelled;
            break;
        }
        let tick = Instant::now();
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };

        let faces = match detector.detect(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        consumer
            .logger()
            .timing("detect", tick.elapsed().as_secs_f64() * 1000.0);

        consumer.on_frame(&frame, &faces, Instant::now());
        frames += 1;
        consumer.logger().progress(frames, metadata.total_frames);

        if consumer.is_done() {
            exit = LoopExit::Completed;
            break;
        }
        if let Some(interval) = pace {
            std::thread::sleep(interval.saturating_sub(tick.elapsed()));
        }
    }

    if failure.is_none() && exit == LoopExit::Exhausted {
        consumer.drain(options.drain_timeout);
    }
    consumer.stop();
    source.close();
    consumer.logger().summary();

    match failure {
        Some(e) => Err(e),
        None => Ok(LoopReport { frames, exit }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::fixtures::frontal;
    use crate::session::session_logger::NullSessionLogger;
    use crate::shared::source_metadata::SourceMetadata;

    /// Yields `count` blank frames; optionally fails at one index.
    struct ScriptedSource {
        count: usize,
        fail_at: Option<usize>,
        closed: usize,
    }

    impl ScriptedSource {
        fn new(count: usize) -> Self {
            Self {
                count,
                fail_at: None,
                closed: 0,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
            Ok(SourceMetadata {
                width: 4,
                height: 4,
                fps: 30.0,
                total_frames: self.count,
                source_path: Some(path.to_path_buf()),
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let fail_at = self.fail_at;
            Box::new((0..self.count).map(move |i| -> Result<Frame, Box<dyn std::error::Error>> {
                if Some(i) == fail_at {
                    Err("corrupt packet".into())
                } else {
                    Ok(Frame::new(vec![0; 4 * 4 * 3], 4, 4, 3, i))
                }
            }))
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    /// Reports one frontal face on every frame.
    struct StubDetector {
        calls: usize,
        fail: bool,
    }

    impl LandmarkDetector for StubDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<LandmarkSet>, Box<dyn std::error::Error>> {
            self.calls += 1;
            if self.fail {
                return Err("inference failed".into());
            }
            Ok(vec![frontal()])
        }
    }

    struct RecordingConsumer {
        seen: Vec<(usize, usize)>,
        done_after: Option<usize>,
        cancel_after: Option<(usize, &'static AtomicBool)>,
        drained: usize,
        stopped: usize,
        logger: NullSessionLogger,
    }

    impl RecordingConsumer {
        fn new() -> Self {
            Self {
                seen: Vec::new(),
                done_after: None,
                cancel_after: None,
                drained: 0,
                stopped: 0,
                logger: NullSessionLogger,
            }
        }
    }

    impl FrameConsumer for RecordingConsumer {
        fn on_frame(&mut self, frame: &Frame, faces: &[LandmarkSet], _now: Instant) {
            self.seen.push((frame.index(), faces.len()));
            if let Some((n, flag)) = self.cancel_after {
                if self.seen.len() == n {
                    flag.store(true, Ordering::Relaxed);
                }
            }
        }

        fn is_done(&self) -> bool {
            self.done_after.is_some_and(|n| self.seen.len() >= n)
        }

        fn drain(&mut self, _timeout: Duration) {
            self.drained += 1;
        }

        fn stop(&mut self) {
            self.stopped += 1;
        }

        fn logger(&mut self) -> &mut dyn SessionLogger {
            &mut self.logger
        }
    }

    fn run(
        source: &mut ScriptedSource,
        detector: &mut StubDetector,
        consumer: &mut RecordingConsumer,
        cancel: &AtomicBool,
    ) -> Result<LoopReport, Box<dyn std::error::Error>> {
        run_frame_loop(
            source,
            Path::new("clip.mp4"),
            detector,
            consumer,
            cancel,
            &LoopOptions::default(),
        )
    }

    fn detector() -> StubDetector {
        StubDetector {
            calls: 0,
            fail: false,
        }
    }

    #[test]
    fn test_runs_every_frame_then_drains_and_stops() {
        let mut source = ScriptedSource::new(5);
        let mut consumer = RecordingConsumer::new();
        let report = run(&mut source, &mut detector(), &mut consumer, &AtomicBool::new(false)).unwrap();

        assert_eq!(report, LoopReport { frames: 5, exit: LoopExit::Exhausted });
        assert_eq!(consumer.seen, vec![(0, 1), (1, 1), (2, 1), (3, 1), (4, 1)]);
        assert_eq!((consumer.drained, consumer.stopped, source.closed), (1, 1, 1));
    }

    #[test]
    fn test_cancel_stops_without_draining() {
        static CANCEL: AtomicBool = AtomicBool::new(false);
        let mut source = ScriptedSource::new(10);
        let mut consumer = RecordingConsumer::new();
        consumer.cancel_after = Some((3, &CANCEL));

        let report = run(&mut source, &mut detector(), &mut consumer, &CANCEL).unwrap();
        assert_eq!(report, LoopReport { frames: 3, exit: LoopExit::Cancelled });
        assert_eq!((consumer.drained, consumer.stopped, source.closed), (0, 1, 1));
    }

    #[test]
    fn test_done_consumer_ends_early() {
        let mut source = ScriptedSource::new(10);
        let mut consumer = RecordingConsumer::new();
        consumer.done_after = Some(4);

        let report = run(&mut source, &mut detector(), &mut consumer, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.exit, LoopExit::Completed);
        assert_eq!(report.frames, 4);
        assert_eq!(consumer.stopped, 1);
    }

    #[test]
    fn test_source_error_still_tears_down() {
        let mut source = ScriptedSource::new(6);
        source.fail_at = Some(2);
        let mut consumer = RecordingConsumer::new();

        let err = run(&mut source, &mut detector(), &mut consumer, &AtomicBool::new(false)).unwrap_err();
        assert_eq!(err.to_string(), "corrupt packet");
        assert_eq!(consumer.seen.len(), 2);
        assert_eq!((consumer.drained, consumer.stopped, source.closed), (0, 1, 1));
    }

    #[test]
    fn test_detector_error_is_returned() {
        let mut source = ScriptedSource::new(3);
        let mut detector = StubDetector {
            calls: 0,
            fail: true,
        };
        let mut consumer = RecordingConsumer::new();

        let err = run(&mut source, &mut detector, &mut consumer, &AtomicBool::new(false)).unwrap_err();
        assert_eq!(err.to_string(), "inference failed");
        assert_eq!(detector.calls, 1);
        assert!(consumer.seen.is_empty());
        assert_eq!(consumer.stopped, 1);
    }
}
