use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde_json::Value;

use crate::dispatch::domain::dispatch_error::DispatchError;
use crate::dispatch::domain::enrollment_service::{CaptureSubmission, EnrollmentService};
use crate::shared::constants::UPLOAD_JPEG_QUALITY;

use super::jpeg_encoder::encode_jpeg;

/// Posts one capture per request as `multipart/form-data`.
///
/// Form fields are the identity fields, `angle`, and an `image` part
/// holding the JPEG-encoded frame.
pub struct HttpEnrollmentService {
    client: Client,
    url: String,
}

impl HttpEnrollmentService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| network_error(&url, &e))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_form(submission: &CaptureSubmission) -> Result<Form, DispatchError> {
        let jpeg = encode_jpeg(&submission.image, UPLOAD_JPEG_QUALITY)?;
        let image = Part::bytes(jpeg)
            .file_name(format!("{}.jpg", submission.angle))
            .mime_str("image/jpeg")
            .map_err(|e| DispatchError::Encode(e.to_string()))?;

        let mut form = Form::new();
        for (name, value) in submission.identity.fields() {
            form = form.text(name, value.to_string());
        }
        Ok(form
            .text("angle", submission.angle.label())
            .part("image", image))
    }
}

impl EnrollmentService for HttpEnrollmentService {
    fn submit_capture(&self, submission: &CaptureSubmission) -> Result<(), DispatchError> {
        let form = Self::build_form(submission)?;
        log::debug!("POST {} angle={}", self.url, submission.angle);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| network_error(&self.url, &e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| network_error(&self.url, &e))?;

        interpret_enrollment_response(status, &body)
    }
}

pub(crate) fn network_error(url: &str, error: &reqwest::Error) -> DispatchError {
    DispatchError::Network {
        url: url.to_string(),
        message: error.to_string(),
    }
}

/// Maps an enrollment reply to success or a typed failure.
///
/// A 2xx reply succeeds when its body is empty, is JSON without a
/// `success` flag, or carries `"success": true`.
pub(crate) fn interpret_enrollment_response(status: u16, body: &str) -> Result<(), DispatchError> {
    if !(200..300).contains(&status) {
        return Err(DispatchError::Status {
            status,
            body: truncate(body, 200),
        });
    }
    if body.trim().is_empty() {
        return Ok(());
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| DispatchError::UnexpectedResponse(format!("malformed body: {e}")))?;
    match value.get("success") {
        None => Ok(()),
        Some(Value::Bool(true)) => Ok(()),
        Some(Value::Bool(false)) => {
            let reason = value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("server reported failure");
            Err(DispatchError::UnexpectedResponse(reason.to_string()))
        }
        Some(other) => Err(DispatchError::UnexpectedResponse(format!(
            "non-boolean success flag: {other}"
        ))),
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::enrollment_form::EnrollmentForm;
    use crate::shared::frame::Frame;
    use crate::shared::pose_angle::PoseAngle;
    use rstest::rstest;

    #[rstest]
    #[case::empty_body(200, "")]
    #[case::success_true(200, r#"{"success": true, "id": 4}"#)]
    #[case::no_flag(201, r#"{"id": 4}"#)]
    fn test_success_responses(#[case] status: u16, #[case] body: &str) {
        assert_eq!(interpret_enrollment_response(status, body), Ok(()));
    }

    #[test]
    fn test_non_2xx_is_status_error() {
        let err = interpret_enrollment_response(422, "bad angle").unwrap_err();
        assert_eq!(
            err,
            DispatchError::Status {
                status: 422,
                body: "bad angle".into()
            }
        );
    }

    #[test]
    fn test_success_false_is_unexpected_with_message() {
        let err =
            interpret_enrollment_response(200, r#"{"success": false, "message": "no face"}"#)
                .unwrap_err();
        assert_eq!(err, DispatchError::UnexpectedResponse("no face".into()));
    }

    #[rstest]
    #[case::malformed("<html>oops</html>")]
    #[case::string_flag(r#"{"success": "yes"}"#)]
    fn test_unexpected_shapes(#[case] body: &str) {
        let err = interpret_enrollment_response(200, body).unwrap_err();
        assert!(err.is_unexpected_response());
    }

    #[test]
    fn test_long_error_body_is_truncated() {
        let body = "x".repeat(1000);
        match interpret_enrollment_response(500, &body).unwrap_err() {
            DispatchError::Status { body, .. } => assert_eq!(body.len(), 200),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_url_is_network_error() {
        let service = HttpEnrollmentService::new("not a url", Duration::from_secs(1)).unwrap();
        let submission = CaptureSubmission {
            identity: EnrollmentForm::new("S-1", "Ada", "Lovelace", "CS"),
            image: Frame::new(vec![0; 8 * 8 * 3], 8, 8, 3, 0),
            angle: PoseAngle::Front,
        };
        let err = service.submit_capture(&submission).unwrap_err();
        assert!(matches!(err, DispatchError::Network { .. }));
    }

    #[test]
    fn test_form_builds_for_valid_frame() {
        let submission = CaptureSubmission {
            identity: EnrollmentForm::new("S-1", "Ada", "Lovelace", "CS"),
            image: Frame::new(vec![0; 8 * 8 * 3], 8, 8, 3, 0),
            angle: PoseAngle::Left,
        };
        assert!(HttpEnrollmentService::build_form(&submission).is_ok());
    }
}
