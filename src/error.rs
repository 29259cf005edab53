use thiserror::Error;

use crate::ingest::SourceKind;

/// Failure conditions surfaced by the density pipeline.
///
/// Per-frame conditions (`Inference`, mid-stream `Read`) are normally handled
/// inside the pipeline loop and only logged; the remaining variants end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load detection model '{descriptor}': {source:#}")]
    ModelLoad {
        descriptor: String,
        source: anyhow::Error,
    },

    #[error("{kind} source '{locator}' is unavailable: {source:#}")]
    SourceUnavailable {
        kind: SourceKind,
        locator: String,
        source: anyhow::Error,
    },

    #[error("inference failed: {source:#}")]
    Inference { source: anyhow::Error },

    #[error("failed to read frame from '{locator}': {source:#}")]
    Read {
        locator: String,
        source: anyhow::Error,
    },

    #[error(
        "frame dimensions changed mid-stream: expected {}x{}, got {}x{}",
        expected.0, expected.1, actual.0, actual.1
    )]
    InconsistentDimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("invalid mode '{choice}'; choose image, video or webcam")]
    InvalidModeSelection { choice: String },

    #[error("{kind} mode requires a file path")]
    MissingLocator { kind: SourceKind },

    #[error("display failed: {source:#}")]
    Display { source: anyhow::Error },

    #[error("invalid configuration: {source:#}")]
    Config { source: anyhow::Error },
}

impl PipelineError {
    /// True for selection mistakes that end the process cleanly after a message.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidModeSelection { .. } | PipelineError::MissingLocator { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn selection_errors_are_user_input() {
        let invalid = PipelineError::InvalidModeSelection {
            choice: "4".to_string(),
        };
        let missing = PipelineError::MissingLocator {
            kind: SourceKind::Video,
        };
        let fatal = PipelineError::ModelLoad {
            descriptor: "yolov8n.onnx".to_string(),
            source: anyhow!("no such file"),
        };

        assert!(invalid.is_user_input());
        assert!(missing.is_user_input());
        assert!(!fatal.is_user_input());
    }

    #[test]
    fn messages_carry_context() {
        let err = PipelineError::SourceUnavailable {
            kind: SourceKind::Webcam,
            locator: "/dev/video0".to_string(),
            source: anyhow!("device busy"),
        };
        let msg = err.to_string();
        assert!(msg.contains("webcam"));
        assert!(msg.contains("/dev/video0"));
        assert!(msg.contains("device busy"));

        let err = PipelineError::InconsistentDimensions {
            expected: (640, 480),
            actual: (320, 240),
        };
        assert_eq!(
            err.to_string(),
            "frame dimensions changed mid-stream: expected 640x480, got 320x240"
        );
    }
}
