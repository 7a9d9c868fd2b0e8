use ndarray::{s, ArrayView3};

use super::bounding_box::PixelRect;

/// One camera frame: contiguous interleaved bytes in row-major order.
///
/// Frames are transient; the frame loop hands each one to the session for a
/// single classification cycle and drops it afterwards unless a dispatch
/// needs its own copy.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `rect` into a new frame with the same index.
    ///
    /// `rect` must lie inside the frame; [`BoundingBox::to_pixel_rect`]
    /// produces rects that do.
    ///
    /// [`BoundingBox::to_pixel_rect`]: super::bounding_box::BoundingBox::to_pixel_rect
    pub fn crop(&self, rect: PixelRect) -> Frame {
        let (x, y) = (rect.x as usize, rect.y as usize);
        let (w, h) = (rect.width as usize, rect.height as usize);
        let view = self.as_ndarray();
        let data: Vec<u8> = view.slice(s![y..y + h, x..x + w, ..]).iter().copied().collect();
        Frame::new(data, rect.width, rect.height, self.channels, self.index)
    }

    /// Bilinear resize to `width` x `height`. Only RGB frames are supported.
    pub fn resized(&self, width: u32, height: u32) -> Option<Frame> {
        if self.channels != 3 {
            return None;
        }
        let img = image::RgbImage::from_raw(self.width, self.height, self.data.clone())?;
        let out = image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
        Some(Frame::new(out.into_raw(), width, height, 3, self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x3 RGB frame where each pixel's R channel encodes `row * 10 + col`.
    fn gradient_frame() -> Frame {
        let mut data = Vec::new();
        for row in 0..3u8 {
            for col in 0..4u8 {
                data.extend_from_slice(&[row * 10 + col, 0, 255]);
            }
        }
        Frame::new(data, 4, 3, 3, 7)
    }

    #[test]
    fn test_construction_and_accessors() {
        let frame = Frame::new(vec![0u8; 12], 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data().len(), 12);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = gradient_frame();
        assert_eq!(frame.as_ndarray().shape(), &[3, 4, 3]);
        assert_eq!(frame.as_ndarray()[[2, 1, 0]], 21);
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient_frame();
        let crop = frame.crop(PixelRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        });
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.index(), 7);
        let reds: Vec<u8> = crop.data().chunks(3).map(|px| px[0]).collect();
        assert_eq!(reds, vec![11, 12, 21, 22]);
    }

    #[test]
    fn test_resized_dimensions() {
        let frame = gradient_frame();
        let out = frame.resized(8, 8).unwrap();
        assert_eq!(out.width(), 8);
        assert_eq!(out.height(), 8);
        assert_eq!(out.data().len(), 8 * 8 * 3);
        // Constant channel survives interpolation.
        assert!(out.data().chunks(3).all(|px| px[2] == 255));
    }

    #[test]
    fn test_resized_rejects_non_rgb() {
        let frame = Frame::new(vec![0u8; 4], 2, 2, 1, 0);
        assert!(frame.resized(4, 4).is_none());
    }
}
