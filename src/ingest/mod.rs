//! Frame sources.
//!
//! Three origins feed the pipeline:
//! - single image files (`ImageSource`)
//! - video: image-sequence directories, synthetic clips, or container files
//!   decoded with FFmpeg (feature: ingest-file-ffmpeg)
//! - live cameras: synthetic, or V4L2 devices (feature: ingest-v4l2)
//!
//! Every source yields RGB24 `Frame`s with fixed dimensions until it reports
//! end-of-stream. `stub://<name>[?frames=N]` locators select synthetic sources
//! for tests and demos.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod image_file;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "ingest-v4l2")]
pub(crate) mod v4l2;
pub mod webcam;

pub use file::VideoSource;
pub use image_file::ImageSource;
pub use webcam::{WebcamSettings, WebcamSource};

/// Origin of a frame stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Image,
    Video,
    Webcam,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Image => "image",
            SourceKind::Video => "video",
            SourceKind::Webcam => "webcam",
        }
    }

    /// Streaming sources loop until end-of-stream or cancellation.
    pub fn is_streaming(self) -> bool {
        !matches!(self, SourceKind::Image)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open frame stream, exclusively owned by the pipeline while it runs.
pub trait FrameSource {
    fn kind(&self) -> SourceKind;

    /// Path, device or `stub://` locator the source was opened from.
    fn locator(&self) -> &str;

    /// Read the next frame. `Ok(None)` marks end-of-stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying handle. Further reads report end-of-stream.
    fn release(&mut self);

    /// Frames read so far.
    fn frames_read(&self) -> u64;
}

/// Opens frame sources by kind and locator.
pub trait SourceOpener {
    fn open(&self, kind: SourceKind, locator: &str) -> Result<Box<dyn FrameSource>>;
}

/// Opener backed by the sources in this module.
#[derive(Clone, Debug, Default)]
pub struct DefaultOpener {
    pub webcam: WebcamSettings,
}

impl DefaultOpener {
    pub fn new(webcam: WebcamSettings) -> Self {
        Self { webcam }
    }
}

impl SourceOpener for DefaultOpener {
    fn open(&self, kind: SourceKind, locator: &str) -> Result<Box<dyn FrameSource>> {
        Ok(match kind {
            SourceKind::Image => Box::new(ImageSource::open(locator)?),
            SourceKind::Video => Box::new(VideoSource::open(locator)?),
            SourceKind::Webcam => {
                let mut settings = self.webcam.clone();
                if !locator.trim().is_empty() {
                    settings.device = locator.to_string();
                }
                Box::new(WebcamSource::open(settings)?)
            }
        })
    }
}

/// Parsed `stub://name?frames=N` locator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StubLocator {
    pub name: String,
    pub frames: Option<u64>,
}

pub(crate) fn parse_stub_locator(locator: &str) -> Option<StubLocator> {
    let rest = locator.strip_prefix("stub://")?;
    let (name, query) = match rest.split_once('?') {
        Some((name, query)) => (name, Some(query)),
        None => (rest, None),
    };
    let frames = query.and_then(|query| {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "frames")
            .and_then(|(_, value)| value.parse().ok())
    });
    Some(StubLocator {
        name: name.to_string(),
        frames,
    })
}

/// Local paths only; URL schemes other than `stub://` are refused.
pub(crate) fn is_local_path(locator: &str) -> bool {
    !locator.trim().is_empty() && !locator.contains("://")
}

/// Deterministic test pattern shared by the synthetic sources.
pub(crate) fn synthetic_pixels(width: u32, height: u32, frame_count: u64) -> Vec<u8> {
    let pixel_count = width as usize * height as usize * 3;
    let mut pixels = vec![0u8; pixel_count];
    for (i, pixel) in pixels.iter_mut().enumerate() {
        *pixel = ((i as u64 + frame_count) % 256) as u8;
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stub_locators() {
        assert_eq!(
            parse_stub_locator("stub://clip?frames=12"),
            Some(StubLocator {
                name: "clip".to_string(),
                frames: Some(12),
            })
        );
        assert_eq!(
            parse_stub_locator("stub://cam"),
            Some(StubLocator {
                name: "cam".to_string(),
                frames: None,
            })
        );
        assert_eq!(parse_stub_locator("clips/a.mp4"), None);
    }

    #[test]
    fn local_paths_exclude_urls() {
        assert!(is_local_path("videos/crowd.mp4"));
        assert!(!is_local_path("rtsp://camera/stream"));
        assert!(!is_local_path("  "));
    }

    #[test]
    fn default_opener_reports_missing_files() {
        let opener = DefaultOpener::default();
        assert!(opener.open(SourceKind::Image, "/nonexistent/crowd.png").is_err());
        assert!(opener.open(SourceKind::Video, "/nonexistent/crowd.mp4").is_err());
    }

    #[test]
    fn default_opener_opens_synthetic_sources() -> Result<()> {
        let opener = DefaultOpener::default();
        for kind in [SourceKind::Image, SourceKind::Video, SourceKind::Webcam] {
            let mut source = opener.open(kind, "stub://test?frames=2")?;
            assert_eq!(source.kind(), kind);
            assert!(source.next_frame()?.is_some());
            source.release();
        }
        Ok(())
    }
}
