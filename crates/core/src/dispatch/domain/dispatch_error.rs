use thiserror::Error;

/// Why a submission to an external service did not succeed.
///
/// None of these are fatal to a session; the user retries by presenting
/// the pose again once the capture lock expires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

impl DispatchError {
    /// The service answered, but not in the shape expected of a success.
    /// Surfaced as a warning rather than an error.
    pub fn is_unexpected_response(&self) -> bool {
        matches!(self, DispatchError::UnexpectedResponse(_))
    }
}
