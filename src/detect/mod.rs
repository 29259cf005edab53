mod backend;
mod backends;
mod detector;
mod labels;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::{filter_people, PersonDetector};
pub use labels::{coco_labels, resolve_class, COCO_LABELS};
pub use registry::{
    load_backend, ModelDescriptor, ModelSettings, DEFAULT_CONFIDENCE, DEFAULT_INPUT_SIZE,
    DEFAULT_IOU, DEFAULT_MODEL,
};
pub use result::{BoundingBox, Detection, ObjectClass, RawDetection};
