//! Per-frame JSON-lines report.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::density::{DensityLabel, DensityReport};

/// One line of the report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub people: usize,
    pub density_percentage: f64,
    pub label: DensityLabel,
}

impl FrameRecord {
    pub fn new(frame: u64, people: usize, report: &DensityReport) -> Self {
        Self {
            frame,
            people,
            density_percentage: report.percentage,
            label: report.label,
        }
    }
}

/// Appends `FrameRecord`s as JSON lines.
pub struct ReportWriter {
    out: Box<dyn Write + Send>,
}

impl ReportWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    pub fn from_writer<W: Write + Send + 'static>(out: W) -> Self {
        Self { out: Box::new(out) }
    }

    pub fn write(&mut self, record: &FrameRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record).context("serialize frame record")?;
        self.out.write_all(b"\n").context("write frame record")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().context("flush report")
    }
}
