//! Frame container shared by sources, detectors and the renderer.
//!
//! A `Frame` is an RGB24 raster with fixed dimensions. Pixels are private and
//! only reachable through a borrowed slice, so a frame flows through one
//! pipeline iteration and is dropped when the iteration ends.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// RGB24 frame produced by a `FrameSource`.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Build a frame from packed RGB24 bytes.
    ///
    /// Fails when either dimension is zero or the buffer length does not match
    /// `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be positive, got {}x{}", width, height));
        }
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Solid-color frame, mostly useful for synthetic sources and tests.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let data = rgb.iter().copied().cycle().take(len).collect();
        Self::new(data, width, height)
    }

    pub fn from_rgb_image(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    /// Read-only pixel access for inference.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copy into an `image` buffer for drawing.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 10], 2, 2).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2).is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(Frame::new(Vec::new(), 0, 10).is_err());
        assert!(Frame::filled(10, 0, [0, 0, 0]).is_err());
    }

    #[test]
    fn filled_frame_repeats_color() -> Result<()> {
        let frame = Frame::filled(2, 1, [1, 2, 3])?;
        assert_eq!(frame.pixels(), &[1, 2, 3, 1, 2, 3]);
        assert_eq!((frame.width(), frame.height()), (2, 1));
        Ok(())
    }

    #[test]
    fn converts_to_rgb_image() -> Result<()> {
        let frame = Frame::filled(4, 3, [9, 8, 7])?;
        let image = frame.to_rgb_image()?;
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(3, 2).0, [9, 8, 7]);

        let back = Frame::from_rgb_image(image)?;
        assert_eq!(back.dimensions(), (4, 3));
        Ok(())
    }
}
