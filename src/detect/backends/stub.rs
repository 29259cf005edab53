use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::coco_labels;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

enum Step {
    Detect(Vec<RawDetection>),
    Fail(String),
}

/// Scripted backend for tests and `stub://` runs.
///
/// Each `infer` call consumes the next scripted step. Once the script is
/// exhausted every call returns the repeating detections (empty by default).
pub struct StubBackend {
    labels: Vec<String>,
    script: VecDeque<Step>,
    repeat: Vec<RawDetection>,
}

impl StubBackend {
    /// Stub with the COCO label table and no detections.
    pub fn new() -> Self {
        Self::with_labels(coco_labels())
    }

    pub fn with_labels(labels: Vec<String>) -> Self {
        Self {
            labels,
            script: VecDeque::new(),
            repeat: Vec::new(),
        }
    }

    /// Queue detections for the next call.
    pub fn then_detect(mut self, detections: Vec<RawDetection>) -> Self {
        self.script.push_back(Step::Detect(detections));
        self
    }

    /// Queue an inference failure.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.script.push_back(Step::Fail(message.to_string()));
        self
    }

    /// Detections returned once the script runs out.
    pub fn repeating(mut self, detections: Vec<RawDetection>) -> Self {
        self.repeat = detections;
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn infer(&mut self, _frame: &Frame) -> Result<Vec<RawDetection>> {
        match self.script.pop_front() {
            Some(Step::Detect(detections)) => Ok(detections),
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            None => Ok(self.repeat.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    #[test]
    fn stub_backend_follows_script_then_repeats() {
        let det = RawDetection::new(BoundingBox::from_corners(0.0, 0.0, 5.0, 5.0), 0.9, 0);
        let mut backend = StubBackend::new()
            .then_detect(vec![det.clone(), det.clone()])
            .then_fail("bad frame")
            .repeating(vec![det.clone()]);
        let frame = Frame::filled(8, 8, [0, 0, 0]).unwrap();

        assert_eq!(backend.infer(&frame).unwrap().len(), 2);
        assert!(backend.infer(&frame).is_err());
        assert_eq!(backend.infer(&frame).unwrap(), vec![det.clone()]);
        assert_eq!(backend.infer(&frame).unwrap(), vec![det]);
        assert_eq!(backend.labels()[0], "person");
    }
}
