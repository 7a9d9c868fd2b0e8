use serde::{Deserialize, Serialize};

use crate::shared::frame::Frame;

use super::dispatch_error::DispatchError;

/// Face crops gathered from one frame of the live feed.
#[derive(Clone, Debug)]
pub struct BatchSubmission {
    pub images: Vec<Frame>,
    pub session_id: String,
    pub context: Option<String>,
}

/// One recognised person as reported by the service. Display only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub identity: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Port to the external recognition endpoint.
pub trait RecognitionService: Send + Sync {
    fn submit_batch(&self, batch: &BatchSubmission) -> Result<Vec<RecognitionResult>, DispatchError>;
}
