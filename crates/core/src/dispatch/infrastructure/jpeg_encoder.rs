use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::dispatch::domain::dispatch_error::DispatchError;
use crate::shared::frame::Frame;

/// Encodes an RGB or grayscale frame as a JPEG.
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, DispatchError> {
    let color = match frame.channels() {
        3 => ExtendedColorType::Rgb8,
        1 => ExtendedColorType::L8,
        n => {
            return Err(DispatchError::Encode(format!(
                "unsupported channel count {n}"
            )))
        }
    };

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(frame.data(), frame.width(), frame.height(), color)
        .map_err(|e| DispatchError::Encode(e.to_string()))?;
    Ok(buf)
}
