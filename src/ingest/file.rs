//! Local video source.
//!
//! `VideoSource` reads frames from one of:
//! - a directory of still images, played back in file-name order
//! - a `stub://` synthetic clip (tests and demos)
//! - a container file decoded with FFmpeg (feature: ingest-file-ffmpeg)
//!
//! Frames are decoded in memory one at a time; nothing is prefetched.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::image_file::load_image;
use super::{is_local_path, parse_stub_locator, synthetic_pixels, FrameSource, SourceKind};
use crate::frame::Frame;

const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;
const SYNTHETIC_CLIP_FRAMES: u64 = 30;
const SEQUENCE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Local video frame source.
pub struct VideoSource {
    locator: String,
    backend: VideoBackend,
    frames_read: u64,
}

enum VideoBackend {
    Synthetic(SyntheticClip),
    Sequence(ImageSequence),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
    Released,
}

impl VideoSource {
    pub fn open(locator: &str) -> Result<Self> {
        let backend = if let Some(stub) = parse_stub_locator(locator) {
            VideoBackend::Synthetic(SyntheticClip::new(
                stub.frames.unwrap_or(SYNTHETIC_CLIP_FRAMES),
            ))
        } else {
            if !is_local_path(locator) {
                return Err(anyhow!(
                    "video input only supports local paths (no URL schemes)"
                ));
            }
            let path = Path::new(locator);
            if !path.exists() {
                return Err(anyhow!("unable to open video file {}", path.display()));
            }
            if path.is_dir() {
                VideoBackend::Sequence(ImageSequence::scan(path)?)
            } else {
                open_container(path)?
            }
        };
        log::info!("VideoSource: opened {}", locator);
        Ok(Self {
            locator: locator.to_string(),
            backend,
            frames_read: 0,
        })
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
fn open_container(path: &Path) -> Result<VideoBackend> {
    Ok(VideoBackend::Ffmpeg(FfmpegFileSource::open(path)?))
}

#[cfg(not(feature = "ingest-file-ffmpeg"))]
fn open_container(path: &Path) -> Result<VideoBackend> {
    Err(anyhow!(
        "decoding {} requires the ingest-file-ffmpeg feature; pass a directory of frames instead",
        path.display()
    ))
}

impl FrameSource for VideoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match &mut self.backend {
            VideoBackend::Synthetic(source) => source.next_frame()?,
            VideoBackend::Sequence(source) => source.next_frame()?,
            #[cfg(feature = "ingest-file-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame()?,
            VideoBackend::Released => None,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if !matches!(self.backend, VideoBackend::Released) {
            log::debug!(
                "VideoSource: released {} after {} frames",
                self.locator,
                self.frames_read
            );
        }
        self.backend = VideoBackend::Released;
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

// ----------------------------------------------------------------------------
// Synthetic clip (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticClip {
    total: u64,
    emitted: u64,
}

impl SyntheticClip {
    fn new(total: u64) -> Self {
        Self { total, emitted: 0 }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.emitted >= self.total {
            return Ok(None);
        }
        self.emitted += 1;
        let pixels = synthetic_pixels(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, self.emitted);
        Frame::new(pixels, SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT).map(Some)
    }
}

// ----------------------------------------------------------------------------
// Image-sequence directory
// ----------------------------------------------------------------------------

struct ImageSequence {
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequence {
    fn scan(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("unable to list frames in {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && has_frame_extension(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(anyhow!("no image frames found in {}", dir.display()));
        }
        paths.sort();
        Ok(Self { paths, cursor: 0 })
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        load_image(path).map(Some)
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SEQUENCE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
