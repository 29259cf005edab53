use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detection model boundary.
///
/// A backend turns one frame into raw detections of every class it knows.
/// Class ids index into `labels()`. Backends hold no per-frame state that the
/// pipeline depends on, so one instance is reused for the whole run.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class names indexed by class id.
    fn labels(&self) -> &[String];

    /// Run inference on a frame.
    ///
    /// Boxes are in frame pixel coordinates.
    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
