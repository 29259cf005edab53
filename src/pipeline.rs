//! Frame-processing pipeline.
//!
//! `PipelineController` drives one run over a frame source:
//!
//! ```text
//! Init --open--> Ready --first frame--> Running --eos/cancel/image--> Terminated
//!   \______________\_______________________\________________________> Error
//! ```
//!
//! Each iteration reads a frame, detects people, computes the density report,
//! renders and shows the annotated frame, then polls for cancellation. A
//! single image runs exactly one iteration and never polls. The source handle
//! is released and the display closed on every exit path, including unwinding.

use anyhow::anyhow;
use serde::Serialize;

use crate::density::{DensityAnalyzer, DensityLabel, DensityReport, DensityThresholds};
use crate::detect::PersonDetector;
use crate::display::Display;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceKind, SourceOpener};
use crate::render::Renderer;
use crate::report::{FrameRecord, ReportWriter};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Init,
    Ready,
    Running,
    Terminated,
    Error,
}

/// Run state fixed from the first frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineState {
    pub source_kind: SourceKind,
    pub frame_width: u32,
    pub frame_height: u32,
    pub running: bool,
}

/// Why a run reached `Terminated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// The single image was processed.
    SingleImage,
    EndOfStream,
    Cancelled,
    /// A mid-stream read failed and the stream could not continue.
    ReadFailure,
}

/// Which source to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRequest {
    pub kind: SourceKind,
    pub locator: String,
}

impl SourceRequest {
    pub fn new(kind: SourceKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
        }
    }
}

/// Aggregates over a completed run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub source_kind: SourceKind,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frames_processed: u64,
    pub total_detections: u64,
    pub peak_density: f64,
    pub mean_density: f64,
    pub sparse_frames: u64,
    pub medium_frames: u64,
    pub crowded_frames: u64,
    pub inference_failures: u64,
    pub render_failures: u64,
    pub end_reason: EndReason,
}

#[derive(Default)]
struct RunStats {
    frames: u64,
    detections: u64,
    density_sum: f64,
    peak_density: f64,
    sparse: u64,
    medium: u64,
    crowded: u64,
    inference_failures: u64,
    render_failures: u64,
}

impl RunStats {
    fn record(&mut self, people: usize, report: &DensityReport) {
        self.frames += 1;
        self.detections += people as u64;
        self.density_sum += report.percentage;
        self.peak_density = self.peak_density.max(report.percentage);
        match report.label {
            DensityLabel::Sparse => self.sparse += 1,
            DensityLabel::Medium => self.medium += 1,
            DensityLabel::Crowded => self.crowded += 1,
        }
    }

    fn finish(self, state: &PipelineState, end_reason: EndReason) -> RunSummary {
        let mean_density = if self.frames == 0 {
            0.0
        } else {
            self.density_sum / self.frames as f64
        };
        RunSummary {
            source_kind: state.source_kind,
            frame_width: state.frame_width,
            frame_height: state.frame_height,
            frames_processed: self.frames,
            total_detections: self.detections,
            peak_density: self.peak_density,
            mean_density,
            sparse_frames: self.sparse,
            medium_frames: self.medium,
            crowded_frames: self.crowded,
            inference_failures: self.inference_failures,
            render_failures: self.render_failures,
            end_reason,
        }
    }
}

/// Closes the display when dropped, including while unwinding.
struct DisplayGuard<'a> {
    display: &'a mut dyn Display,
}

impl Drop for DisplayGuard<'_> {
    fn drop(&mut self) {
        self.display.close();
    }
}

/// Exclusive owner of an open source; releases it when dropped.
struct SourceGuard {
    source: Box<dyn FrameSource>,
}

impl SourceGuard {
    fn next_frame(&mut self) -> anyhow::Result<Option<Frame>> {
        self.source.next_frame()
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.source.release();
        log::debug!(
            "released {} source {} ({} frames read)",
            self.source.kind(),
            self.source.locator(),
            self.source.frames_read()
        );
    }
}

pub struct PipelineController {
    detector: PersonDetector,
    renderer: Renderer,
    thresholds: DensityThresholds,
    report: Option<ReportWriter>,
    stage: PipelineStage,
    state: Option<PipelineState>,
}

impl PipelineController {
    pub fn new(detector: PersonDetector, renderer: Renderer) -> Self {
        Self {
            detector,
            renderer,
            thresholds: DensityThresholds::default(),
            report: None,
            stage: PipelineStage::Init,
            state: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: DensityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Append one JSON line per processed frame to `writer`.
    pub fn with_report(mut self, writer: ReportWriter) -> Self {
        self.report = Some(writer);
        self
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn state(&self) -> Option<&PipelineState> {
        self.state.as_ref()
    }

    pub fn detector(&self) -> &PersonDetector {
        &self.detector
    }

    /// Open the requested source and process it to completion.
    ///
    /// The display is closed and the source released before this returns,
    /// whatever the outcome.
    pub fn run(
        &mut self,
        opener: &dyn SourceOpener,
        request: &SourceRequest,
        display: &mut dyn Display,
    ) -> Result<RunSummary, PipelineError> {
        self.stage = PipelineStage::Init;
        self.state = None;

        let result = {
            let mut display = DisplayGuard { display };
            self.drive(opener, request, &mut *display.display)
        };

        if let Some(report) = self.report.as_mut() {
            if let Err(err) = report.flush() {
                log::warn!("{:#}", err);
            }
        }
        if let Some(state) = self.state.as_mut() {
            state.running = false;
        }

        match &result {
            Ok(summary) => {
                self.transition(PipelineStage::Terminated);
                log::info!(
                    "{} run finished ({:?}): {} frames, peak density {:.2}%, mean {:.2}%",
                    summary.source_kind,
                    summary.end_reason,
                    summary.frames_processed,
                    summary.peak_density,
                    summary.mean_density
                );
            }
            Err(err) => {
                self.transition(PipelineStage::Error);
                log::error!("{}", err);
            }
        }
        result
    }

    fn drive(
        &mut self,
        opener: &dyn SourceOpener,
        request: &SourceRequest,
        display: &mut dyn Display,
    ) -> Result<RunSummary, PipelineError> {
        let kind = request.kind;
        let opened =
            opener
                .open(kind, &request.locator)
                .map_err(|source| PipelineError::SourceUnavailable {
                    kind,
                    locator: request.locator.clone(),
                    source,
                })?;
        let mut source = SourceGuard { source: opened };
        self.transition(PipelineStage::Ready);

        let first = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Err(PipelineError::Read {
                    locator: request.locator.clone(),
                    source: anyhow!("source produced no frames"),
                })
            }
            Err(source) => {
                return Err(PipelineError::Read {
                    locator: request.locator.clone(),
                    source,
                })
            }
        };

        let (frame_width, frame_height) = first.dimensions();
        let state = PipelineState {
            source_kind: kind,
            frame_width,
            frame_height,
            running: true,
        };
        let analyzer = DensityAnalyzer::with_thresholds(frame_width, frame_height, self.thresholds);
        self.state = Some(state.clone());
        self.transition(PipelineStage::Running);

        let mut stats = RunStats::default();
        let mut pending = Some(first);
        let end_reason = loop {
            let frame = match pending.take() {
                Some(frame) => frame,
                None => match source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break EndReason::EndOfStream,
                    Err(err) => {
                        log::warn!(
                            "read from {} failed after {} frames, ending stream: {:#}",
                            request.locator,
                            stats.frames,
                            err
                        );
                        break EndReason::ReadFailure;
                    }
                },
            };

            if frame.dimensions() != (frame_width, frame_height) {
                return Err(PipelineError::InconsistentDimensions {
                    expected: (frame_width, frame_height),
                    actual: frame.dimensions(),
                });
            }

            self.process_frame(&frame, &analyzer, display, &mut stats)?;

            if !kind.is_streaming() {
                break EndReason::SingleImage;
            }
            if display.poll_cancel() {
                break EndReason::Cancelled;
            }
        };

        Ok(stats.finish(&state, end_reason))
    }

    fn process_frame(
        &mut self,
        frame: &Frame,
        analyzer: &DensityAnalyzer,
        display: &mut dyn Display,
        stats: &mut RunStats,
    ) -> Result<(), PipelineError> {
        let failures_before = self.detector.failures();
        let detections = self.detector.detect(frame);
        stats.inference_failures += self.detector.failures() - failures_before;

        let report = analyzer.analyze(&detections);
        stats.record(detections.len(), &report);
        log::debug!(
            "frame {}: {} people, {}",
            stats.frames,
            detections.len(),
            report.summary()
        );

        if let Some(writer) = self.report.as_mut() {
            let record = FrameRecord::new(stats.frames, detections.len(), &report);
            if let Err(err) = writer.write(&record) {
                log::warn!("frame {}: {:#}", stats.frames, err);
            }
        }

        match self.renderer.render(frame, &detections, &report) {
            Ok(annotated) => display
                .show(&annotated)
                .map_err(|source| PipelineError::Display { source }),
            Err(err) => {
                stats.render_failures += 1;
                log::warn!("frame {}: render failed, skipping display: {:#}", stats.frames, err);
                Ok(())
            }
        }
    }

    fn transition(&mut self, next: PipelineStage) {
        log::debug!("pipeline {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }
}
