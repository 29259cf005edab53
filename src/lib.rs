//! Crowd density estimation.
//!
//! Detects people in still images, video and live camera frames, measures how
//! much of each frame they occupy, and annotates the frame with boxes, a
//! people count and a density tier (Sparse / Medium / Crowded).
//!
//! # Module Structure
//!
//! - `frame`: RGB24 frame raster
//! - `detect`: detector backends (YOLOv8 ONNX via tract, scripted stub) and person filtering
//! - `density`: occupancy percentage and tier classification
//! - `ingest`: frame sources (image files, video, webcams)
//! - `render`: box and text overlay drawing
//! - `display`: output surface and cooperative cancellation
//! - `pipeline`: the per-frame state machine tying the above together
//! - `report`, `selection`, `config`, `ui`: run plumbing for the binary

pub mod config;
pub mod density;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod selection;
pub mod ui;

pub use config::CrowdConfig;
pub use density::{
    calculate_density, classify, DensityAnalyzer, DensityLabel, DensityReport, DensityThresholds,
    Rgb,
};
pub use detect::{BoundingBox, Detection, DetectorBackend, PersonDetector, RawDetection};
pub use display::{CancellationToken, Display, FrameWriterDisplay};
pub use error::PipelineError;
pub use frame::Frame;
pub use ingest::{DefaultOpener, FrameSource, SourceKind, SourceOpener};
pub use pipeline::{
    EndReason, PipelineController, PipelineStage, PipelineState, RunSummary, SourceRequest,
};
pub use render::{AnnotatedFrame, Renderer, TextOverlay};
pub use report::{FrameRecord, ReportWriter};
pub use selection::Selection;
