//! Live camera source.
//!
//! `WebcamSource` captures from a V4L2 device (feature: ingest-v4l2) or from a
//! synthetic `stub://` camera. A camera never reports end-of-stream on its
//! own; a synthetic camera may be given a frame budget to simulate unplugging.

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[cfg(feature = "ingest-v4l2")]
use super::v4l2::DeviceWebcam;
use super::{is_local_path, parse_stub_locator, synthetic_pixels, FrameSource, SourceKind};
use crate::frame::Frame;

/// Capture settings for a live camera.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebcamSettings {
    /// Device path (e.g., "/dev/video0") or `stub://` locator.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Requested capture rate in frames per second; 0 leaves the driver default.
    pub target_fps: u32,
}

impl Default for WebcamSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

pub struct WebcamSource {
    device: String,
    backend: WebcamBackend,
    frames_read: u64,
}

enum WebcamBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceWebcam),
    Released,
}

impl WebcamSource {
    pub fn open(settings: WebcamSettings) -> Result<Self> {
        let backend = if let Some(stub) = parse_stub_locator(&settings.device) {
            log::info!("WebcamSource: connected to {} (synthetic)", settings.device);
            WebcamBackend::Synthetic(SyntheticCamera::new(&settings, stub.frames))
        } else {
            if !is_local_path(&settings.device) {
                return Err(anyhow!("webcam input only supports local device paths"));
            }
            open_device(&settings)?
        };
        Ok(Self {
            device: settings.device,
            backend,
            frames_read: 0,
        })
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(settings: &WebcamSettings) -> Result<WebcamBackend> {
    Ok(WebcamBackend::Device(DeviceWebcam::open(settings)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(settings: &WebcamSettings) -> Result<WebcamBackend> {
    Err(anyhow!(
        "capturing from {} requires the ingest-v4l2 feature",
        settings.device
    ))
}

impl FrameSource for WebcamSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Webcam
    }

    fn locator(&self) -> &str {
        &self.device
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = match &mut self.backend {
            WebcamBackend::Synthetic(camera) => camera.next_frame()?,
            #[cfg(feature = "ingest-v4l2")]
            WebcamBackend::Device(camera) => Some(camera.next_frame()?),
            WebcamBackend::Released => None,
        };
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    fn release(&mut self) {
        if !matches!(self.backend, WebcamBackend::Released) {
            log::info!(
                "WebcamSource: released {} after {} frames",
                self.device,
                self.frames_read
            );
        }
        self.backend = WebcamBackend::Released;
    }

    fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    width: u32,
    height: u32,
    budget: Option<u64>,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(settings: &WebcamSettings, budget: Option<u64>) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            budget,
            frame_count: 0,
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.budget.is_some_and(|budget| self.frame_count >= budget) {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = synthetic_pixels(self.width, self.height, self.frame_count);
        Frame::new(pixels, self.width, self.height).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_settings(device: &str) -> WebcamSettings {
        WebcamSettings {
            device: device.to_string(),
            width: 320,
            height: 240,
            target_fps: 10,
        }
    }

    #[test]
    fn synthetic_camera_produces_configured_size() -> Result<()> {
        let mut source = WebcamSource::open(stub_settings("stub://cam"))?;
        for _ in 0..5 {
            let frame = source.next_frame()?.expect("camera keeps streaming");
            assert_eq!(frame.dimensions(), (320, 240));
        }
        assert_eq!(source.frames_read(), 5);
        Ok(())
    }

    #[test]
    fn synthetic_budget_simulates_disconnect() -> Result<()> {
        let mut source = WebcamSource::open(stub_settings("stub://cam?frames=2"))?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn release_stops_capture() -> Result<()> {
        let mut source = WebcamSource::open(stub_settings("stub://cam"))?;
        source.release();
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_devices_need_the_v4l2_feature() {
        assert!(WebcamSource::open(stub_settings("/dev/video0")).is_err());
    }
}
