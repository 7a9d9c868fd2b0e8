use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::source_metadata::SourceMetadata;
use crate::video::domain::frame_source::FrameSource;

/// Replays still images as a frame stream.
///
/// A directory yields its images sorted by file name; a single file yields
/// one frame. Images are decoded lazily, one per frame.
pub struct ImageSequenceSource {
    fps: f64,
    paths: Vec<PathBuf>,
    opened: bool,
}

impl ImageSequenceSource {
    /// `fps` is reported in the metadata and used for real-time pacing;
    /// 0 means no native rate.
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            paths: Vec::new(),
            opened: false,
        }
    }

    pub fn is_image_path(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
    }

    fn list(path: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        if !path.is_dir() {
            return Ok(vec![path.to_path_buf()]);
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let p = entry?.path();
            if p.is_file() && Self::is_image_path(&p) {
                paths.push(p);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl Default for ImageSequenceSource {
    fn default() -> Self {
        Self::new(0.0)
    }
}

fn load_rgb(path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, index))
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>> {
        let paths = Self::list(path)?;
        let first = paths
            .first()
            .ok_or_else(|| format!("no images found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)?;

        self.paths = paths;
        self.opened = true;
        Ok(SourceMetadata {
            width,
            height,
            fps: self.fps,
            total_frames: self.paths.len(),
            source_path: Some(path.to_path_buf()),
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if !self.opened {
            return Box::new(std::iter::once(Err(
                "ImageSequenceSource: not opened".into()
            )));
        }
        Box::new(
            self.paths
                .iter()
                .enumerate()
                .map(|(i, p)| load_rgb(p, i)),
        )
    }

    fn close(&mut self) {
        self.paths.clear();
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32, shade: u8) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([shade, 100, 200]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_directory_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 32, 24, 2);
        write_png(dir.path(), "a.png", 32, 24, 1);
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageSequenceSource::new(15.0);
        let meta = source.open(dir.path()).unwrap();
        assert_eq!((meta.width, meta.height, meta.total_frames), (32, 24, 2));
        assert_eq!(meta.fps, 15.0);

        let frames: Vec<Frame> = source.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames[0].data()[0], 1);
        assert_eq!(frames[1].data()[0], 2);
        assert_eq!(frames[1].index(), 1);
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "one.png", 10, 8, 50);

        let mut source = ImageSequenceSource::default();
        let meta = source.open(&path).unwrap();
        assert_eq!(meta.total_frames, 1);
        assert_eq!(meta.source_path, Some(path));

        let frame = source.frames().next().unwrap().unwrap();
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::default();
        assert!(source.open(dir.path()).is_err());
    }

    #[test]
    fn test_frames_before_open_is_error() {
        let mut source = ImageSequenceSource::default();
        assert!(source.frames().next().unwrap().is_err());
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert!(ImageSequenceSource::is_image_path(Path::new("x/IMG_01.JPG")));
        assert!(!ImageSequenceSource::is_image_path(Path::new("x/clip.mp4")));
    }
}
