use crate::capture::domain::enrollment_form::EnrollmentForm;
use crate::shared::frame::Frame;
use crate::shared::pose_angle::PoseAngle;

use super::dispatch_error::DispatchError;

/// One validated capture, ready to send.
#[derive(Clone, Debug)]
pub struct CaptureSubmission {
    pub identity: EnrollmentForm,
    pub image: Frame,
    pub angle: PoseAngle,
}

/// Port to the external enrollment endpoint.
///
/// Called from dispatch worker threads, so implementations must be
/// shareable. `Ok(())` means the service confirmed the capture.
pub trait EnrollmentService: Send + Sync {
    fn submit_capture(&self, submission: &CaptureSubmission) -> Result<(), DispatchError>;
}
