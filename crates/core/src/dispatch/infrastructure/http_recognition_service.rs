use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::dispatch::domain::dispatch_error::DispatchError;
use crate::dispatch::domain::recognition_service::{
    BatchSubmission, RecognitionResult, RecognitionService,
};
use crate::shared::constants::UPLOAD_JPEG_QUALITY;

use super::http_enrollment_service::network_error;
use super::jpeg_encoder::encode_jpeg;

/// Posts a batch of face crops as repeated `images[]` parts.
pub struct HttpRecognitionService {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecognitionReply {
    Wrapped { results: Vec<RecognitionResult> },
    Bare(Vec<RecognitionResult>),
}

impl HttpRecognitionService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DispatchError> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| network_error(&url, &e))?;
        Ok(Self { client, url })
    }

    fn build_form(batch: &BatchSubmission) -> Result<Form, DispatchError> {
        let mut form = Form::new().text("session_id", batch.session_id.clone());
        if let Some(context) = &batch.context {
            form = form.text("context", context.clone());
        }
        for (i, image) in batch.images.iter().enumerate() {
            let part = Part::bytes(encode_jpeg(image, UPLOAD_JPEG_QUALITY)?)
                .file_name(format!("face_{i}.jpg"))
                .mime_str("image/jpeg")
                .map_err(|e| DispatchError::Encode(e.to_string()))?;
            form = form.part("images[]", part);
        }
        Ok(form)
    }
}

impl RecognitionService for HttpRecognitionService {
    fn submit_batch(&self, batch: &BatchSubmission) -> Result<Vec<RecognitionResult>, DispatchError> {
        let form = Self::build_form(batch)?;
        log::debug!(
            "POST {} session={} faces={}",
            self.url,
            batch.session_id,
            batch.images.len()
        );

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| network_error(&self.url, &e))?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| network_error(&self.url, &e))?;

        interpret_recognition_response(status, &body)
    }
}

pub(crate) fn interpret_recognition_response(
    status: u16,
    body: &str,
) -> Result<Vec<RecognitionResult>, DispatchError> {
    if !(200..300).contains(&status) {
        return Err(DispatchError::Status {
            status,
            body: body.chars().take(200).collect(),
        });
    }
    match serde_json::from_str::<RecognitionReply>(body) {
        Ok(RecognitionReply::Wrapped { results }) | Ok(RecognitionReply::Bare(results)) => {
            Ok(results)
        }
        Err(e) => Err(DispatchError::UnexpectedResponse(format!(
            "malformed recognition reply: {e}"
        ))),
    }
}
