use anyhow::anyhow;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::resolve_class;
use crate::detect::registry::{load_backend, ModelSettings};
use crate::detect::result::{Detection, RawDetection};
use crate::error::PipelineError;
use crate::frame::Frame;

const PERSON_LABEL: &str = "person";

/// Person detector wrapping a model backend.
///
/// The person class id is resolved from the backend's label table once, when
/// the detector is built. Per-frame filtering compares integer ids only.
pub struct PersonDetector {
    backend: Box<dyn DetectorBackend>,
    person_class: u32,
    calls: u64,
    failures: u64,
}

impl PersonDetector {
    pub fn new(backend: Box<dyn DetectorBackend>) -> Result<Self, PipelineError> {
        let person_class =
            resolve_class(backend.labels(), PERSON_LABEL).ok_or_else(|| PipelineError::ModelLoad {
                descriptor: backend.name().to_string(),
                source: anyhow!("model has no '{}' class", PERSON_LABEL),
            })?;
        Ok(Self {
            backend,
            person_class,
            calls: 0,
            failures: 0,
        })
    }

    /// Load a backend from a model descriptor and wrap it.
    pub fn load(descriptor: &str, settings: &ModelSettings) -> Result<Self, PipelineError> {
        let mut backend = load_backend(descriptor, settings)?;
        backend
            .warm_up()
            .map_err(|source| PipelineError::ModelLoad {
                descriptor: descriptor.to_string(),
                source,
            })?;
        Self::new(backend)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn person_class(&self) -> u32 {
        self.person_class
    }

    /// Number of inference calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Number of inference calls that failed.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Run inference and keep only person detections.
    pub fn try_detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PipelineError> {
        self.calls += 1;
        match self.backend.infer(frame) {
            Ok(raw) => Ok(filter_people(raw, self.person_class)),
            Err(source) => {
                self.failures += 1;
                Err(PipelineError::Inference { source })
            }
        }
    }

    /// Like `try_detect`, but an inference failure is logged and yields no
    /// detections so that the stream keeps running.
    pub fn detect(&mut self, frame: &Frame) -> Vec<Detection> {
        match self.try_detect(frame) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("{}: {}; treating frame as empty", self.backend.name(), err);
                Vec::new()
            }
        }
    }
}

/// Keep raw detections of `person_class`, preserving their order.
pub fn filter_people(raw: Vec<RawDetection>, person_class: u32) -> Vec<Detection> {
    raw.into_iter()
        .filter(|det| det.class_id == person_class)
        .map(|det| Detection::person(det.bbox, det.confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubBackend;
    use crate::detect::result::BoundingBox;

    fn raw(x1: f32, class_id: u32, confidence: f32) -> RawDetection {
        RawDetection::new(
            BoundingBox::from_corners(x1, 0.0, x1 + 10.0, 10.0),
            confidence,
            class_id,
        )
    }

    fn frame() -> Frame {
        Frame::filled(64, 64, [0, 0, 0]).unwrap()
    }

    #[test]
    fn keeps_only_people_in_order() {
        let input = vec![
            raw(0.0, 0, 0.9),
            raw(10.0, 2, 0.8),
            raw(20.0, 0, 0.7),
            raw(30.0, 16, 0.95),
            raw(40.0, 0, 0.5),
        ];
        let people = filter_people(input, 0);
        let xs: Vec<f32> = people.iter().map(|d| d.bbox.x1).collect();
        assert_eq!(xs, vec![0.0, 20.0, 40.0]);
        assert!(people.iter().all(|d| d.class_label() == "person"));
        assert_eq!(people[1].confidence, 0.7);
    }

    #[test]
    fn person_class_comes_from_label_table() {
        let labels = vec!["car".to_string(), "dog".to_string(), "person".to_string()];
        let backend = StubBackend::with_labels(labels)
            .then_detect(vec![raw(0.0, 0, 0.9), raw(10.0, 2, 0.8)]);
        let mut detector = PersonDetector::new(Box::new(backend)).unwrap();
        assert_eq!(detector.person_class(), 2);

        let people = detector.detect(&frame());
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].bbox.x1, 10.0);
    }

    #[test]
    fn missing_person_label_is_a_load_failure() {
        let backend = StubBackend::with_labels(vec!["car".to_string()]);
        match PersonDetector::new(Box::new(backend)) {
            Err(PipelineError::ModelLoad { descriptor, .. }) => assert_eq!(descriptor, "stub"),
            other => panic!("expected model load failure, got {:?}", other.err()),
        }
    }

    #[test]
    fn inference_failure_yields_empty_frame() {
        let backend = StubBackend::new()
            .then_fail("malformed frame")
            .then_detect(vec![raw(0.0, 0, 0.9)]);
        let mut detector = PersonDetector::new(Box::new(backend)).unwrap();

        assert!(detector.detect(&frame()).is_empty());
        assert_eq!(detector.detect(&frame()).len(), 1);
        assert_eq!(detector.calls(), 2);
        assert_eq!(detector.failures(), 1);
    }

    #[test]
    fn try_detect_surfaces_inference_error() {
        let backend = StubBackend::new().then_fail("boom");
        let mut detector = PersonDetector::new(Box::new(backend)).unwrap();
        assert!(matches!(
            detector.try_detect(&frame()),
            Err(PipelineError::Inference { .. })
        ));
    }
}
