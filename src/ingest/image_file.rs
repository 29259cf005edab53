//! Single still image source.
//!
//! The image is decoded when the source opens, so a missing or undecodable
//! file surfaces as an open failure. The stream then yields that one frame.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use super::{is_local_path, parse_stub_locator, synthetic_pixels, FrameSource, SourceKind};
use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;

pub struct ImageSource {
    locator: String,
    pending: Option<Frame>,
    frames_read: u64,
}

impl ImageSource {
    pub fn open(locator: &str) -> Result<Self> {
        let frame = if parse_stub_locator(locator).is_some() {
            Frame::new(
                synthetic_pixels(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, 0),
                SYNTHETIC_WIDTH,
                SYNTHETIC_HEIGHT,
            )?
        } else {
            if !is_local_path(locator) {
                return Err(anyhow!("image input only supports local paths"));
            }
            load_image(Path::new(locator))?
        };
        log::info!(
            "ImageSource: opened {} ({}x{})",
            locator,
            frame.width(),
            frame.height()
        );
        Ok(Self {
            locator: locator.to_string(),
            pending: Some(frame),
            frames_read: 0,
        })
    }
}

impl FrameSource for ImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.pending.take();
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        self.pending = None;
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

/// Decode an image file into an RGB24 frame.
pub(crate) fn load_image(path: &Path) -> Result<Frame> {
    let decoded = image::open(path)
        .with_context(|| format!("unable to load image from {}", path.display()))?;
    Frame::from_rgb_image(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn yields_the_image_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("crowd.png");
        RgbImage::from_pixel(32, 16, Rgb([10, 20, 30])).save(&path)?;

        let mut source = ImageSource::open(path.to_str().unwrap())?;
        let frame = source.next_frame()?.expect("one frame");
        assert_eq!(frame.dimensions(), (32, 16));
        assert_eq!(&frame.pixels()[..3], &[10, 20, 30]);
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.frames_read(), 1);
        Ok(())
    }

    #[test]
    fn unreadable_file_fails_to_open() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image")?;
        assert!(ImageSource::open(path.to_str().unwrap()).is_err());
        assert!(ImageSource::open("/nonexistent/crowd.png").is_err());
        Ok(())
    }

    #[test]
    fn release_drops_pending_frame() -> Result<()> {
        let mut source = ImageSource::open("stub://still")?;
        source.release();
        assert!(source.next_frame()?.is_none());
        Ok(())
    }
}
