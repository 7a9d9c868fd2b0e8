pub mod http_enrollment_service;
pub mod http_recognition_service;
pub mod jpeg_encoder;
