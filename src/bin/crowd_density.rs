//! crowd_density - Person detection and crowd density estimation.
//!
//! Runs over a single image, a video (file or image-sequence directory) or a
//! live camera, logging the people count and density tier of every frame.
//! Annotated frames can be written to a directory and per-frame results to a
//! JSON-lines report.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;

use crowd_density::display::{CancellationToken, FrameWriterDisplay};
use crowd_density::ingest::DefaultOpener;
use crowd_density::selection::{self, Selection};
use crowd_density::ui::{Ui, UiMode};
use crowd_density::{
    CrowdConfig, PersonDetector, PipelineController, PipelineError, Renderer, ReportWriter,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detect people and estimate crowd density in images, video and webcam streams"
)]
struct Args {
    /// Mode: image, video, webcam (or 1, 2, 3). Prompts interactively when omitted.
    mode: Option<String>,

    /// Image or video path. Webcam mode takes an optional device override.
    path: Option<String>,

    /// Model descriptor: path to a YOLOv8 ONNX export, or `stub`.
    #[arg(long, env = "CROWD_MODEL")]
    model: Option<String>,

    /// Directory for annotated PNG frames.
    #[arg(long, env = "CROWD_OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Write one JSON line per processed frame to this file.
    #[arg(long)]
    report: Option<PathBuf>,

    /// TrueType/OpenType font used to draw overlay text.
    #[arg(long, env = "CROWD_FONT_PATH")]
    font: Option<PathBuf>,

    /// Stage indicator style.
    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let selection = match select(&args) {
        Ok(selection) => selection,
        Err(err) => match err.downcast_ref::<PipelineError>() {
            Some(user_err) if user_err.is_user_input() => {
                eprintln!("{}", user_err);
                return Ok(());
            }
            _ => return Err(err),
        },
    };

    let mut cfg = CrowdConfig::load().map_err(|source| PipelineError::Config { source })?;
    if let Some(model) = args.model.clone() {
        cfg.model = model;
    }
    if let Some(dir) = args.output.clone() {
        cfg.output_dir = Some(dir);
    }
    if let Some(path) = args.report.clone() {
        cfg.report_path = Some(path);
    }
    if let Some(font) = args.font.clone() {
        cfg.font_path = Some(font);
    }

    let ui = Ui::for_stderr(args.ui);

    let detector = {
        let stage = ui.stage(&format!("load model {}", cfg.model));
        match PersonDetector::load(&cfg.model, &cfg.model_settings) {
            Ok(detector) => detector,
            Err(err) => {
                stage.fail();
                return Err(err.into());
            }
        }
    };
    log::info!(
        "detector ready: backend={} person_class={}",
        detector.backend_name(),
        detector.person_class()
    );

    let renderer = match cfg.font_path.as_deref() {
        Some(path) => Renderer::with_font_file(path)?,
        None => Renderer::with_system_font(),
    };
    log::debug!("overlay text enabled: {}", renderer.draws_text());

    let mut pipeline = PipelineController::new(detector, renderer).with_thresholds(cfg.thresholds);
    if let Some(path) = cfg.report_path.as_deref() {
        pipeline = pipeline.with_report(ReportWriter::create(path)?);
    }

    let cancel = CancellationToken::new();
    cancel.install_ctrlc_handler()?;

    let mut display =
        FrameWriterDisplay::new(cancel.clone()).with_prefix(selection.kind.as_str());
    if let Some(dir) = cfg.output_dir.as_deref() {
        display = display.with_output_dir(dir)?;
    }

    let opener = DefaultOpener::new(cfg.webcam.clone());
    log::info!(
        "processing {} {}",
        selection.kind,
        if selection.locator.is_empty() {
            cfg.webcam.device.as_str()
        } else {
            selection.locator.as_str()
        }
    );
    let summary = pipeline.run(&opener, &selection.request(), &mut display)?;
    ui.summary(&summary);
    Ok(())
}

/// Selection from arguments, or from the interactive menu when no mode is given.
///
/// Runs before any configuration or device is touched so that a bad choice
/// exits without side effects.
fn select(args: &Args) -> Result<Selection> {
    let selection = match args.mode.as_deref() {
        Some(mode) => Selection::parse(mode, args.path.as_deref()),
        None => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            selection::prompt(&mut stdin.lock(), &mut stdout).context("interactive selection")?
        }
    };
    Ok(selection?)
}
