use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use rollcall_core::capture::domain::enrollment_form::EnrollmentForm;
use rollcall_core::detection::domain::landmark_detector::LandmarkDetector;
use rollcall_core::detection::infrastructure::model_resolver;
use rollcall_core::detection::infrastructure::onnx_landmark_detector::{
    OnnxLandmarkDetector, DEFAULT_CONFIDENCE,
};
use rollcall_core::dispatch::infrastructure::http_enrollment_service::HttpEnrollmentService;
use rollcall_core::dispatch::infrastructure::http_recognition_service::HttpRecognitionService;
use rollcall_core::session::enrollment_session::EnrollmentSession;
use rollcall_core::session::frame_loop::{run_frame_loop, LoopExit, LoopOptions};
use rollcall_core::session::recognition_loop::RecognitionLoop;
use rollcall_core::session::session_events::LogObserver;
use rollcall_core::session::session_logger::StdoutSessionLogger;
use rollcall_core::shared::capture_config::CaptureConfig;
use rollcall_core::shared::constants::{LANDMARK_MODEL_NAME, LANDMARK_MODEL_URL};
use rollcall_core::video::domain::frame_source::FrameSource;
use rollcall_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use rollcall_core::video::infrastructure::image_sequence_source::ImageSequenceSource;

/// Pose-gated face enrollment and live attendance recognition.
#[derive(Parser)]
#[command(name = "rollcall", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture the five enrollment angles for one subject.
    Enroll(EnrollArgs),
    /// Send face crops to the recognition service at a throttled rate.
    Recognize(RecognizeArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Video file, capture device URL, image, or directory of images.
    input: PathBuf,

    /// JSON file overriding capture thresholds and timings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Landmark model to use instead of the cached/downloaded one.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Pace frames at the source frame rate instead of as fast as possible.
    #[arg(long)]
    realtime: bool,

    /// Frame rate reported for image sequences (0 = unpaced).
    #[arg(long, default_value = "0")]
    image_fps: f64,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<u64>,
}

#[derive(Args)]
struct EnrollArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Enrollment endpoint URL.
    #[arg(long)]
    endpoint: String,

    #[arg(long)]
    subject_id: String,

    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,

    /// Class, section or cohort.
    #[arg(long)]
    classification: String,
}

#[derive(Args)]
struct RecognizeArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Recognition endpoint URL.
    #[arg(long)]
    endpoint: String,

    /// Attendance session the batches belong to.
    #[arg(long)]
    session_id: String,

    /// Free-form context forwarded with every batch (room, course...).
    #[arg(long)]
    context: Option<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Enroll(args) => run_enroll(args),
        Command::Recognize(args) => run_recognize(args),
    }
}

fn run_enroll(args: EnrollArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate(&args.source)?;
    let config = load_config(args.source.config.as_deref())?;

    let identity = EnrollmentForm::new(
        args.subject_id,
        args.first_name,
        args.last_name,
        args.classification,
    );
    let service = Arc::new(HttpEnrollmentService::new(
        args.endpoint,
        config.request_timeout(),
    )?);
    let mut session = EnrollmentSession::new(
        &config,
        identity,
        service,
        Box::new(LogObserver),
        Box::new(StdoutSessionLogger::default()),
    );
    session.start()?;

    let mut detector = build_detector(&args.source)?;
    let mut source = open_source(&args.source);
    let cancel = cancel_flag(args.source.duration);
    let report = run_frame_loop(
        source.as_mut(),
        &args.source.input,
        detector.as_mut(),
        &mut session,
        &cancel,
        &loop_options(&args.source),
    )?;

    let captured = session.status().captured_count();
    let required = config.angle_sequence.len();
    if session.is_complete() {
        log::info!(
            "Enrolled {} ({captured} angles, {} frames)",
            session.identity().subject_id,
            report.frames
        );
        Ok(())
    } else {
        let reason = match report.exit {
            LoopExit::Cancelled => "time limit reached",
            _ => "input ended",
        };
        Err(format!("enrollment incomplete ({reason}): captured {captured} of {required} angles").into())
    }
}

fn run_recognize(args: RecognizeArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate(&args.source)?;
    if args.session_id.trim().is_empty() {
        return Err("Session id must not be blank".into());
    }
    let config = load_config(args.source.config.as_deref())?;

    let service = Arc::new(HttpRecognitionService::new(
        args.endpoint,
        config.request_timeout(),
    )?);
    let mut recognition = RecognitionLoop::new(
        &config,
        args.session_id,
        args.context,
        service,
        Box::new(LogObserver),
        Box::new(StdoutSessionLogger::default()),
    );

    let mut detector = build_detector(&args.source)?;
    let mut source = open_source(&args.source);
    let cancel = cancel_flag(args.source.duration);
    let report = run_frame_loop(
        source.as_mut(),
        &args.source.input,
        detector.as_mut(),
        &mut recognition,
        &cancel,
        &loop_options(&args.source),
    )?;
    log::info!("Recognition ended after {} frames", report.frames);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CaptureConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(CaptureConfig::load(p)?),
        None => Ok(CaptureConfig::default()),
    }
}

fn build_detector(args: &SourceArgs) -> Result<Box<dyn LandmarkDetector>, Box<dyn std::error::Error>> {
    let model_path = match &args.model {
        Some(path) => path.clone(),
        None => {
            log::info!("Resolving model: {LANDMARK_MODEL_NAME}");
            let path = model_resolver::resolve(
                LANDMARK_MODEL_NAME,
                LANDMARK_MODEL_URL,
                None,
                Some(Box::new(download_progress)),
            )?;
            eprintln!();
            path
        }
    };
    Ok(Box::new(OnnxLandmarkDetector::new(&model_path, args.confidence)?))
}

fn open_source(args: &SourceArgs) -> Box<dyn FrameSource> {
    if args.input.is_dir() || ImageSequenceSource::is_image_path(&args.input) {
        Box::new(ImageSequenceSource::new(args.image_fps))
    } else {
        Box::new(FfmpegFrameSource::new())
    }
}

fn loop_options(args: &SourceArgs) -> LoopOptions {
    LoopOptions {
        realtime: args.realtime,
        ..LoopOptions::default()
    }
}

/// Raised by a timer thread once `duration` seconds have passed.
fn cancel_flag(duration: Option<u64>) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    if let Some(secs) = duration {
        let timer = Arc::clone(&flag);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            timer.store(true, Ordering::Relaxed);
        });
    }
    flag
}

fn validate(args: &SourceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let is_url = args.input.to_str().is_some_and(|s| s.contains("://"));
    if !is_url && !args.input.exists() {
        return Err(format!("Input not found: {}", args.input.display()).into());
    }
    if !(0.0..=1.0).contains(&args.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            args.confidence
        )
        .into());
    }
    if args.image_fps < 0.0 {
        return Err(format!("Image fps must not be negative, got {}", args.image_fps).into());
    }
    if let Some(model) = &args.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading landmark model... {pct}%");
    } else {
        eprint!("\rDownloading landmark model... {downloaded} bytes");
    }
}
