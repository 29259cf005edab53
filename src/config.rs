use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::density::DensityThresholds;
use crate::detect::{ModelSettings, DEFAULT_MODEL};
use crate::ingest::WebcamSettings;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CrowdConfigFile {
    model: Option<ModelConfigFile>,
    webcam: Option<WebcamSettings>,
    density: Option<DensityThresholds>,
    render: Option<RenderConfigFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    descriptor: Option<String>,
    input_size: Option<u32>,
    confidence: Option<f32>,
    iou: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RenderConfigFile {
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
    report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrowdConfig {
    /// `stub`, `stub://<name>` or a path to a YOLOv8 ONNX export.
    pub model: String,
    pub model_settings: ModelSettings,
    pub webcam: WebcamSettings,
    pub thresholds: DensityThresholds,
    /// Font for overlay text; without one only boxes are drawn.
    pub font_path: Option<PathBuf>,
    /// Directory receiving annotated PNG frames.
    pub output_dir: Option<PathBuf>,
    /// JSON-lines per-frame report.
    pub report_path: Option<PathBuf>,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            model_settings: ModelSettings::default(),
            webcam: WebcamSettings::default(),
            thresholds: DensityThresholds::default(),
            font_path: None,
            output_dir: None,
            report_path: None,
        }
    }
}

impl CrowdConfig {
    /// Defaults, then the TOML file named by `CROWD_CONFIG`, then `CROWD_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CROWD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CrowdConfigFile) -> Self {
        let defaults = Self::default();
        let model = file.model.unwrap_or_default();
        let render = file.render.unwrap_or_default();
        let output = file.output.unwrap_or_default();
        Self {
            model: model.descriptor.unwrap_or(defaults.model),
            model_settings: ModelSettings {
                input_size: model
                    .input_size
                    .unwrap_or(defaults.model_settings.input_size),
                confidence: model
                    .confidence
                    .unwrap_or(defaults.model_settings.confidence),
                iou: model.iou.unwrap_or(defaults.model_settings.iou),
            },
            webcam: file.webcam.unwrap_or(defaults.webcam),
            thresholds: file.density.unwrap_or(defaults.thresholds),
            font_path: render.font_path,
            output_dir: output.dir,
            report_path: output.report_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(model) = std::env::var("CROWD_MODEL") {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
        if let Ok(device) = std::env::var("CROWD_WEBCAM_DEVICE") {
            if !device.trim().is_empty() {
                self.webcam.device = device;
            }
        }
        if let Ok(dir) = std::env::var("CROWD_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(path) = std::env::var("CROWD_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(confidence) = std::env::var("CROWD_CONFIDENCE") {
            self.model_settings.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("CROWD_CONFIDENCE must be a number between 0 and 1"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model descriptor must not be empty"));
        }
        let settings = &self.model_settings;
        if settings.input_size == 0 {
            return Err(anyhow!("model input_size must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&settings.confidence) {
            return Err(anyhow!(
                "model confidence must be within [0, 1], got {}",
                settings.confidence
            ));
        }
        if !(0.0..=1.0).contains(&settings.iou) {
            return Err(anyhow!("model iou must be within [0, 1], got {}", settings.iou));
        }
        if self.webcam.width == 0 || self.webcam.height == 0 {
            return Err(anyhow!("webcam width and height must be greater than zero"));
        }
        self.thresholds.validate()
    }
}

fn read_config_file(path: &Path) -> Result<CrowdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
