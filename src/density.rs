//! Occupancy metric and density tiers.
//!
//! Density is the summed area of person boxes over the frame area, in percent.
//! Overlapping boxes are counted once each, so the figure can exceed 100.

use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::Detection;

pub const DEFAULT_MEDIUM_ABOVE: f64 = 10.0;
pub const DEFAULT_CROWDED_ABOVE: f64 = 30.0;

/// RGB display color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const YELLOW: Rgb = Rgb(255, 255, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    pub fn to_array(self) -> [u8; 3] {
        [self.0, self.1, self.2]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DensityLabel {
    Sparse,
    Medium,
    Crowded,
}

impl DensityLabel {
    pub fn color(self) -> Rgb {
        match self {
            DensityLabel::Sparse => Rgb::GREEN,
            DensityLabel::Medium => Rgb::YELLOW,
            DensityLabel::Crowded => Rgb::RED,
        }
    }
}

impl fmt::Display for DensityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DensityLabel::Sparse => "Sparse",
            DensityLabel::Medium => "Medium",
            DensityLabel::Crowded => "Crowded",
        };
        f.write_str(name)
    }
}

/// Tier boundaries. A percentage equal to a boundary belongs to the lower tier.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DensityThresholds {
    pub medium_above: f64,
    pub crowded_above: f64,
}

impl Default for DensityThresholds {
    fn default() -> Self {
        Self {
            medium_above: DEFAULT_MEDIUM_ABOVE,
            crowded_above: DEFAULT_CROWDED_ABOVE,
        }
    }
}

impl DensityThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.medium_above.is_finite() && self.crowded_above.is_finite()) {
            return Err(anyhow!("density thresholds must be finite"));
        }
        if self.medium_above < 0.0 || self.medium_above > self.crowded_above {
            return Err(anyhow!(
                "density thresholds must satisfy 0 <= medium_above ({}) <= crowded_above ({})",
                self.medium_above,
                self.crowded_above
            ));
        }
        Ok(())
    }

    pub fn classify(&self, percentage: f64) -> (DensityLabel, Rgb) {
        let label = if percentage > self.crowded_above {
            DensityLabel::Crowded
        } else if percentage > self.medium_above {
            DensityLabel::Medium
        } else {
            DensityLabel::Sparse
        };
        (label, label.color())
    }
}

/// Per-frame density result. Recomputed every frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DensityReport {
    pub percentage: f64,
    pub label: DensityLabel,
    pub color: Rgb,
}

impl DensityReport {
    /// Overlay text, e.g. `12.50% (Medium)`.
    pub fn summary(&self) -> String {
        format!("{:.2}% ({})", self.percentage, self.label)
    }
}

/// Density percentage of `detections` on a `frame_width x frame_height` frame.
///
/// Returns 0 for a zero-area frame.
pub fn calculate_density(detections: &[Detection], frame_width: u32, frame_height: u32) -> f64 {
    let frame_area = frame_width as f64 * frame_height as f64;
    if frame_area == 0.0 {
        return 0.0;
    }
    let total_person_area: f64 = detections.iter().map(|d| d.bbox.area()).sum();
    // Scale before dividing so integral areas land exactly on tier boundaries.
    total_person_area * 100.0 / frame_area
}

/// Tier and color for a density percentage using the default boundaries.
pub fn classify(density_percentage: f64) -> (DensityLabel, Rgb) {
    DensityThresholds::default().classify(density_percentage)
}

/// Density analyzer bound to the frame size fixed when a stream opens.
#[derive(Clone, Copy, Debug)]
pub struct DensityAnalyzer {
    frame_width: u32,
    frame_height: u32,
    thresholds: DensityThresholds,
}

impl DensityAnalyzer {
    pub fn new(frame_width: u32, frame_height: u32) -> Self {
        Self::with_thresholds(frame_width, frame_height, DensityThresholds::default())
    }

    pub fn with_thresholds(frame_width: u32, frame_height: u32, thresholds: DensityThresholds) -> Self {
        Self {
            frame_width,
            frame_height,
            thresholds,
        }
    }

    pub fn calculate_density(&self, detections: &[Detection]) -> f64 {
        calculate_density(detections, self.frame_width, self.frame_height)
    }

    pub fn classify(&self, density_percentage: f64) -> (DensityLabel, Rgb) {
        self.thresholds.classify(density_percentage)
    }

    pub fn analyze(&self, detections: &[Detection]) -> DensityReport {
        let percentage = self.calculate_density(detections);
        let (label, color) = self.classify(percentage);
        DensityReport {
            percentage,
            label,
            color,
        }
    }
}
