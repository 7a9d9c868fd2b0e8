/// YOLO face model with a 5-point keypoint head (eyes, nose, mouth corners).
pub const LANDMARK_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const LANDMARK_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Directory name used under the platform cache/data dir.
pub const APP_DIR_NAME: &str = "Rollcall";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// JPEG quality for images sent to the enrollment and recognition services.
pub const UPLOAD_JPEG_QUALITY: u8 = 90;
