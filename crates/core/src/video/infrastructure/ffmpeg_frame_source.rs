use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::Frame;
use crate::shared::source_metadata::SourceMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Decodes a video file, stream URL or capture device with ffmpeg-next.
///
/// Every decoded picture is scaled to packed RGB24.
pub struct FfmpegFrameSource {
    opened: Option<Opened>,
}

struct Opened {
    input: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
}

// Safety: the source is driven by a single frame-loop thread; ffmpeg
// contexts are never shared between threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn new() -> Self {
        Self { opened: None }
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let input = ffmpeg_next::format::input(path)?;
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("no video stream found")?;
        let stream_index = stream.index();

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let (width, height) = (decoder.width(), decoder.height());

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let total_frames = stream.frames().max(0) as usize;

        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        self.opened = Some(Opened {
            input,
            decoder,
            scaler,
            stream_index,
        });

        Ok(SourceMetadata {
            width,
            height,
            fps,
            total_frames,
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match self.opened.as_mut() {
            Some(opened) => Box::new(DecodeIter {
                opened,
                frame_index: 0,
                flushing: false,
                done: false,
            }),
            None => Box::new(std::iter::once(Err("FfmpegFrameSource: not opened".into()))),
        }
    }

    fn close(&mut self) {
        self.opened = None;
    }
}

/// Pulls packets on demand so only one decoded picture is held at a time.
struct DecodeIter<'a> {
    opened: &'a mut Opened,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl DecodeIter<'_> {
    fn receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = Video::empty();
        self.opened.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = Video::empty();
        if let Err(e) = self.opened.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let (width, height) = (rgb.width(), rgb.height());
        let frame = Frame::new(packed_rgb(&rgb), width, height, 3, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(result) = self.receive() {
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.opened.input.packets().next() else {
                let _ = self.opened.decoder.send_eof();
                self.flushing = true;
                let result = self.receive();
                self.done = result.is_none();
                return result;
            };
            if stream.index() != self.opened.stream_index {
                continue;
            }
            if let Err(e) = self.opened.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }
            if let Some(result) = self.receive() {
                return Some(result);
            }
        }
    }
}

/// Drops per-row stride padding from an RGB24 picture.
fn packed_rgb(picture: &Video) -> Vec<u8> {
    let stride = picture.stride(0);
    let row_bytes = picture.width() as usize * 3;
    let data = picture.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * picture.height() as usize);
    for row in 0..picture.height() as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
