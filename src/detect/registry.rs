//! Model descriptor resolution.
//!
//! A descriptor is either `stub` / `stub://<name>` for the scripted backend or
//! a filesystem path to a YOLOv8 ONNX export.

use std::path::PathBuf;

use anyhow::anyhow;
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::backends::StubBackend;
use crate::error::PipelineError;

pub const DEFAULT_MODEL: &str = "yolov8n.onnx";
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.45;

/// Inference parameters shared by model backends.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Minimum class score kept after decoding.
    pub confidence: f32,
    /// IoU above which overlapping boxes of one class are suppressed.
    pub iou: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence: DEFAULT_CONFIDENCE,
            iou: DEFAULT_IOU,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelDescriptor {
    Stub,
    Onnx(PathBuf),
}

impl ModelDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, PipelineError> {
        let trimmed = descriptor.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::ModelLoad {
                descriptor: descriptor.to_string(),
                source: anyhow!("model descriptor is empty"),
            });
        }
        if trimmed == "stub" || trimmed.starts_with("stub://") {
            return Ok(Self::Stub);
        }
        if trimmed.contains("://") {
            return Err(PipelineError::ModelLoad {
                descriptor: descriptor.to_string(),
                source: anyhow!("models are loaded from local paths only"),
            });
        }
        Ok(Self::Onnx(PathBuf::from(trimmed)))
    }
}

/// Resolve a descriptor into a ready backend.
pub fn load_backend(
    descriptor: &str,
    settings: &ModelSettings,
) -> Result<Box<dyn DetectorBackend>, PipelineError> {
    match ModelDescriptor::parse(descriptor)? {
        ModelDescriptor::Stub => {
            log::info!("using stub detector backend ({})", descriptor);
            Ok(Box::new(StubBackend::new()))
        }
        ModelDescriptor::Onnx(path) => load_onnx(descriptor, path, settings),
    }
}

#[cfg(feature = "backend-tract")]
fn load_onnx(
    descriptor: &str,
    path: PathBuf,
    settings: &ModelSettings,
) -> Result<Box<dyn DetectorBackend>, PipelineError> {
    use crate::detect::backends::TractBackend;

    if !path.is_file() {
        return Err(PipelineError::ModelLoad {
            descriptor: descriptor.to_string(),
            source: anyhow!("model file {} not found", path.display()),
        });
    }
    TractBackend::new(&path, settings)
        .map(|backend| Box::new(backend) as Box<dyn DetectorBackend>)
        .map_err(|source| PipelineError::ModelLoad {
            descriptor: descriptor.to_string(),
            source,
        })
}

#[cfg(not(feature = "backend-tract"))]
fn load_onnx(
    descriptor: &str,
    _path: PathBuf,
    _settings: &ModelSettings,
) -> Result<Box<dyn DetectorBackend>, PipelineError> {
    Err(PipelineError::ModelLoad {
        descriptor: descriptor.to_string(),
        source: anyhow!("ONNX models require the backend-tract feature"),
    })
}
