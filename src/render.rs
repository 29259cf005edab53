//! Frame annotation.
//!
//! The renderer draws one box per detection and produces the text overlays
//! (per-box confidence, people count, density summary) as data. Text is
//! rasterized with the configured font, or with the first loadable system font
//! from `SYSTEM_FONTS`.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb as Pixel, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::density::{DensityReport, Rgb};
use crate::detect::Detection;
use crate::frame::Frame;

const BOX_COLOR: Rgb = Rgb::GREEN;
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;
const SUMMARY_SCALE: f32 = 22.0;

/// Fonts tried, in order, when no font is configured.
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Text drawn over a frame, anchored at its top-left corner.
#[derive(Clone, Debug, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: Rgb,
    pub scale: f32,
}

/// Result of annotating one frame.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub image: RgbImage,
    /// Box labels first, then the count and density summaries.
    pub overlays: Vec<TextOverlay>,
    pub people: usize,
    pub report: DensityReport,
}

impl AnnotatedFrame {
    /// The two summary lines: people count and density.
    pub fn summary_overlays(&self) -> &[TextOverlay] {
        let start = self.overlays.len().saturating_sub(2);
        &self.overlays[start..]
    }
}

#[derive(Clone, Default)]
pub struct Renderer {
    font: Option<FontArc>,
}

impl Renderer {
    /// Renderer that draws boxes and records text overlays without rasterizing them.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    /// Load a TrueType/OpenType font for text rasterization.
    pub fn with_font_file(path: &Path) -> Result<Self> {
        load_font(path).map(Self::with_font)
    }

    /// Use the first loadable font from `SYSTEM_FONTS`. Without one, overlays
    /// are still produced but not drawn.
    pub fn with_system_font() -> Self {
        match first_loadable_font(SYSTEM_FONTS.iter().map(Path::new)) {
            Some((path, font)) => {
                log::info!("overlay font: {}", path.display());
                Self::with_font(font)
            }
            None => {
                log::warn!("no system font found; overlay text will not be drawn");
                Self::new()
            }
        }
    }

    pub fn draws_text(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(
        &self,
        frame: &Frame,
        detections: &[Detection],
        report: &DensityReport,
    ) -> Result<AnnotatedFrame> {
        let mut image = frame.to_rgb_image()?;
        let mut overlays = Vec::with_capacity(detections.len() + 2);

        for det in detections {
            if let Some(rect) = box_rect(det) {
                for inset in 0..BOX_THICKNESS {
                    if let Some(inner) = shrink(rect, inset) {
                        draw_hollow_rect_mut(&mut image, inner, Pixel(BOX_COLOR.to_array()));
                    }
                }
            }
            overlays.push(TextOverlay {
                text: format!("Person: {:.2}", det.confidence),
                x: det.bbox.x1 as i32,
                y: (det.bbox.y1 as i32 - LABEL_SCALE as i32 - 2).max(0),
                color: BOX_COLOR,
                scale: LABEL_SCALE,
            });
        }

        overlays.push(TextOverlay {
            text: format!("Total People: {}", detections.len()),
            x: 10,
            y: 10,
            color: Rgb::WHITE,
            scale: SUMMARY_SCALE,
        });
        overlays.push(TextOverlay {
            text: format!("Density: {}", report.summary()),
            x: 10,
            y: 40,
            color: report.color,
            scale: SUMMARY_SCALE,
        });

        if let Some(font) = &self.font {
            for overlay in &overlays {
                draw_text_mut(
                    &mut image,
                    Pixel(overlay.color.to_array()),
                    overlay.x,
                    overlay.y,
                    PxScale::from(overlay.scale),
                    font,
                    &overlay.text,
                );
            }
        }

        Ok(AnnotatedFrame {
            image,
            overlays,
            people: detections.len(),
            report: *report,
        })
    }
}

fn load_font(path: &Path) -> Result<FontArc> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}

fn first_loadable_font<'a>(
    candidates: impl IntoIterator<Item = &'a Path>,
) -> Option<(&'a Path, FontArc)> {
    candidates
        .into_iter()
        .find_map(|path| match load_font(path) {
            Ok(font) => Some((path, font)),
            Err(err) => {
                log::debug!("{:#}", err);
                None
            }
        })
}

fn box_rect(det: &Detection) -> Option<Rect> {
    let width = det.bbox.width().round() as u32;
    let height = det.bbox.height().round() as u32;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Rect::at(det.bbox.x1.round() as i32, det.bbox.y1.round() as i32).of_size(width, height))
}

fn shrink(rect: Rect, inset: i32) -> Option<Rect> {
    let width = rect.width() as i32 - 2 * inset;
    let height = rect.height() as i32 - 2 * inset;
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(Rect::at(rect.left() + inset, rect.top() + inset).of_size(width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::DensityAnalyzer;
    use crate::detect::BoundingBox;

    fn setup() -> (Frame, Vec<Detection>, DensityReport) {
        let frame = Frame::filled(100, 100, [0, 0, 0]).unwrap();
        let dets = vec![
            Detection::person(BoundingBox::from_corners(10.0, 20.0, 30.0, 60.0), 0.87),
            Detection::person(BoundingBox::from_corners(50.0, 50.0, 90.0, 90.0), 0.5),
        ];
        let report = DensityAnalyzer::new(100, 100).analyze(&dets);
        (frame, dets, report)
    }

    #[test]
    fn draws_one_box_per_detection() -> Result<()> {
        let (frame, dets, report) = setup();
        let annotated = Renderer::new().render(&frame, &dets, &report)?;

        let green = Pixel([0, 255, 0]);
        assert_eq!(*annotated.image.get_pixel(10, 20), green);
        assert_eq!(*annotated.image.get_pixel(11, 40), green);
        assert_eq!(*annotated.image.get_pixel(50, 50), green);
        assert_eq!(*annotated.image.get_pixel(20, 40), Pixel([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn overlays_label_each_box_and_summarize() -> Result<()> {
        let (frame, dets, report) = setup();
        let annotated = Renderer::new().render(&frame, &dets, &report)?;

        assert_eq!(annotated.overlays.len(), 4);
        assert_eq!(annotated.overlays[0].text, "Person: 0.87");
        assert_eq!(annotated.overlays[1].text, "Person: 0.50");

        let summary = annotated.summary_overlays();
        assert_eq!(summary[0].text, "Total People: 2");
        assert_eq!(summary[1].text, "Density: 24.00% (Medium)");
        assert_eq!(summary[1].color, Rgb::YELLOW);
        assert_eq!(annotated.people, 2);
        Ok(())
    }

    #[test]
    fn degenerate_boxes_are_labeled_but_not_drawn() -> Result<()> {
        let frame = Frame::filled(20, 20, [0, 0, 0])?;
        let dets = vec![Detection::person(
            BoundingBox::from_corners(5.0, 5.0, 5.0, 15.0),
            0.4,
        )];
        let report = DensityAnalyzer::new(20, 20).analyze(&dets);
        let annotated = Renderer::new().render(&frame, &dets, &report)?;
        assert_eq!(annotated.overlays.len(), 3);
        assert!(annotated.image.pixels().all(|p| *p == Pixel([0, 0, 0])));
        Ok(())
    }

    #[test]
    fn font_lookup_skips_missing_and_invalid_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font")?;
        let missing = dir.path().join("missing.ttf");

        assert!(first_loadable_font([missing.as_path(), bogus.as_path()]).is_none());
        Ok(())
    }

    #[test]
    fn system_font_draws_summary_text() -> Result<()> {
        let renderer = Renderer::with_system_font();
        if !renderer.draws_text() {
            // Host has none of the fallback fonts.
            return Ok(());
        }
        let frame = Frame::filled(200, 80, [0, 0, 0])?;
        let report = DensityAnalyzer::new(200, 80).analyze(&[]);
        let annotated = renderer.render(&frame, &[], &report)?;

        let lit = (0..200)
            .flat_map(|x| (0..80).map(move |y| (x, y)))
            .filter(|&(x, y)| *annotated.image.get_pixel(x, y) != Pixel([0, 0, 0]))
            .count();
        assert!(lit > 0);
        Ok(())
    }

    #[test]
    fn missing_font_file_is_an_error() {
        assert!(Renderer::with_font_file(Path::new("/nonexistent/font.ttf")).is_err());
    }
}
