//! Display and cancellation boundary.
//!
//! The pipeline shows each annotated frame through a `Display` and polls it
//! for a stop request once per streaming iteration. Cancellation is
//! cooperative: a request takes effect after the current frame completes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::render::AnnotatedFrame;

/// Shared stop flag, set from a signal handler or another thread.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Cancel this token on Ctrl-C / SIGTERM.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            log::info!("stop requested; finishing current frame");
            token.cancel();
        })
        .context("error setting Ctrl-C handler")
    }
}

/// Output surface for annotated frames.
pub trait Display {
    /// Present one annotated frame.
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<()>;

    /// True once the user asked to stop.
    fn poll_cancel(&mut self) -> bool;

    /// Release the display context. Called exactly once when a run ends.
    fn close(&mut self) {}
}

/// Headless display: logs each frame's summary and optionally writes the
/// annotated image to a directory as `<prefix>_NNNNNN.png`.
pub struct FrameWriterDisplay {
    out_dir: Option<PathBuf>,
    prefix: String,
    cancel: CancellationToken,
    shown: u64,
}

impl FrameWriterDisplay {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            out_dir: None,
            prefix: "frame".to_string(),
            cancel,
            shown: 0,
        }
    }

    /// Write annotated frames into `dir`, creating it if needed.
    pub fn with_output_dir(mut self, dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        self.out_dir = Some(dir.to_path_buf());
        Ok(self)
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }

    fn frame_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_{:06}.png", self.prefix, self.shown))
    }
}

impl Display for FrameWriterDisplay {
    fn show(&mut self, frame: &AnnotatedFrame) -> Result<()> {
        self.shown += 1;
        log::info!(
            "frame {}: {} people, density {}",
            self.shown,
            frame.people,
            frame.report.summary()
        );
        if let Some(dir) = &self.out_dir {
            let path = self.frame_path(dir);
            frame
                .image
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            log::debug!("wrote {}", path.display());
        }
        Ok(())
    }

    fn poll_cancel(&mut self) -> bool {
        self.cancel.is_cancelled()
    }

    fn close(&mut self) {
        log::debug!("display closed after {} frames", self.shown);
    }
}
