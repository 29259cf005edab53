#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::coco_labels;
use crate::detect::registry::ModelSettings;
use crate::detect::result::{BoundingBox, RawDetection};
use crate::frame::Frame;

/// Tract-based YOLOv8 backend for ONNX inference.
///
/// Frames are resized to the square model input, inferred on the CPU and the
/// `[1, 4 + classes, anchors]` head is decoded with per-class NMS. Boxes are
/// mapped back to frame coordinates before they are returned.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    labels: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: &ModelSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} (input {}x{}, conf {:.2}, iou {:.2})",
            model_path.display(),
            settings.input_size,
            settings.input_size,
            settings.confidence,
            settings.iou
        );

        Ok(Self {
            model,
            input_size: settings.input_size,
            confidence_threshold: settings.confidence,
            iou_threshold: settings.iou,
            labels: coco_labels(),
        })
    }

    /// Replace the label table, for checkpoints trained on other classes.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.to_rgb_image()?;
        let size = self.input_size;
        let resized = imageops::resize(&image, size, size, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let scale_x = frame.width() as f32 / self.input_size as f32;
        let scale_y = frame.height() as f32 / self.input_size as f32;
        let candidates = decode_yolov8(&view, self.confidence_threshold)?;
        Ok(non_max_suppression(candidates, self.iou_threshold)
            .into_iter()
            .map(|det| RawDetection {
                bbox: det.bbox.scale(scale_x, scale_y).clip(frame.width(), frame.height()),
                ..det
            })
            .collect())
    }

    fn warm_up(&mut self) -> Result<()> {
        let size = self.input_size;
        let blank = Frame::filled(size, size, [114, 114, 114])?;
        self.infer(&blank).map(|_| ())
    }
}

/// Decode a YOLOv8 detection head.
///
/// Accepts `[1, 4 + C, N]` or the transposed `[1, N, 4 + C]` layout. Each anchor
/// keeps its best-scoring class when that score exceeds `confidence_threshold`.
pub(crate) fn decode_yolov8(
    output: &tract_ndarray::ArrayViewD<'_, f32>,
    confidence_threshold: f32,
) -> Result<Vec<RawDetection>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(anyhow!("unexpected YOLOv8 output shape {:?}", shape));
    }
    let view = output
        .index_axis(tract_ndarray::Axis(0), 0)
        .into_dimensionality::<tract_ndarray::Ix2>()
        .context("YOLOv8 output is not two-dimensional per batch")?;
    // Anchors outnumber rows in every YOLOv8 export.
    let view = if view.shape()[0] > view.shape()[1] {
        view.reversed_axes()
    } else {
        view
    };
    let (rows, anchors) = (view.shape()[0], view.shape()[1]);
    if rows <= 4 {
        return Err(anyhow!("YOLOv8 output has no class scores ({} rows)", rows));
    }

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for row in 4..rows {
            let score = view[[row, anchor]];
            if score > best_score {
                best_score = score;
                best_class = row - 4;
            }
        }
        if best_score <= confidence_threshold {
            continue;
        }
        let bbox = BoundingBox::from_center(
            view[[0, anchor]],
            view[[1, anchor]],
            view[[2, anchor]],
            view[[3, anchor]],
        );
        detections.push(RawDetection::new(bbox, best_score, best_class as u32));
    }
    Ok(detections)
}

/// Greedy class-aware NMS; survivors are ordered by descending confidence.
pub(crate) fn non_max_suppression(
    mut candidates: Vec<RawDetection>,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILLER: [f32; 6] = [5.0, 5.0, 1.0, 1.0, 0.01, 0.01];

    fn head(anchors: &[[f32; 6]]) -> tract_ndarray::ArrayD<f32> {
        // rows: cx, cy, w, h, class0, class1
        let mut out = tract_ndarray::Array3::<f32>::zeros((1, 6, anchors.len()));
        for (i, a) in anchors.iter().enumerate() {
            for (row, value) in a.iter().enumerate() {
                out[[0, row, i]] = *value;
            }
        }
        out.into_dyn()
    }

    #[test]
    fn decodes_best_class_above_threshold() -> Result<()> {
        let out = head(&[
            [50.0, 50.0, 20.0, 40.0, 0.9, 0.1],
            [10.0, 10.0, 4.0, 4.0, 0.1, 0.6],
            [30.0, 30.0, 4.0, 4.0, 0.2, 0.1],
            FILLER,
            FILLER,
            FILLER,
            FILLER,
        ]);
        let dets = decode_yolov8(&out.view(), 0.25)?;
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_id, 0);
        assert_eq!(dets[0].bbox, BoundingBox::from_corners(40.0, 30.0, 60.0, 70.0));
        assert_eq!(dets[1].class_id, 1);
        Ok(())
    }

    #[test]
    fn decodes_transposed_layout() -> Result<()> {
        let out = head(&[
            [50.0, 50.0, 20.0, 40.0, 0.9, 0.1],
            [10.0, 10.0, 4.0, 4.0, 0.1, 0.6],
            [30.0, 30.0, 4.0, 4.0, 0.2, 0.1],
            [70.0, 70.0, 4.0, 4.0, 0.8, 0.1],
            FILLER,
            FILLER,
            FILLER,
        ]);
        let transposed = out.permuted_axes(vec![0, 2, 1]);
        let dets = decode_yolov8(&transposed.view(), 0.25)?;
        assert_eq!(dets.len(), 3);
        Ok(())
    }

    #[test]
    fn nms_suppresses_overlaps_within_a_class() {
        let a = RawDetection::new(BoundingBox::from_corners(0.0, 0.0, 10.0, 10.0), 0.9, 0);
        let b = RawDetection::new(BoundingBox::from_corners(1.0, 1.0, 11.0, 11.0), 0.8, 0);
        let c = RawDetection::new(BoundingBox::from_corners(1.0, 1.0, 11.0, 11.0), 0.7, 1);
        let kept = non_max_suppression(vec![b, c.clone(), a.clone()], 0.45);
        assert_eq!(kept, vec![a, c]);
    }
}
