//! Mode and source selection.
//!
//! A run is chosen either from command-line arguments (`image <path>`,
//! `video <path>`, `webcam`, or the menu numbers `1`/`2`/`3`) or through the
//! interactive numbered menu.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::error::PipelineError;
use crate::ingest::SourceKind;
use crate::pipeline::SourceRequest;

pub const MENU: &str = "Choose an option:\n\
1. Process Image\n\
2. Process Video\n\
3. Realtime Detection (Webcam)\n";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub kind: SourceKind,
    /// File path for image/video. Empty for webcam, which uses the configured device.
    pub locator: String,
}

impl Selection {
    /// Build a selection from a mode word or menu number and an optional path.
    pub fn parse(mode: &str, path: Option<&str>) -> Result<Self, PipelineError> {
        let kind = parse_mode(mode)?;
        let locator = match kind {
            SourceKind::Webcam => path.map(str::trim).unwrap_or_default().to_string(),
            _ => match path.map(str::trim) {
                Some(path) if !path.is_empty() => path.to_string(),
                _ => return Err(PipelineError::MissingLocator { kind }),
            },
        };
        Ok(Self { kind, locator })
    }

    pub fn request(&self) -> SourceRequest {
        SourceRequest::new(self.kind, self.locator.clone())
    }
}

fn parse_mode(mode: &str) -> Result<SourceKind, PipelineError> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "1" | "image" => Ok(SourceKind::Image),
        "2" | "video" => Ok(SourceKind::Video),
        "3" | "webcam" => Ok(SourceKind::Webcam),
        _ => Err(PipelineError::InvalidModeSelection {
            choice: mode.trim().to_string(),
        }),
    }
}

/// Show the numbered menu on `output` and read the choice (and path) from `input`.
///
/// I/O failures surface as the outer `anyhow::Error`; an invalid choice or a
/// missing path is the inner `PipelineError`.
pub fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> Result<Result<Selection, PipelineError>> {
    write!(output, "{}Enter your choice: ", MENU).context("write menu")?;
    output.flush().context("flush menu")?;
    let choice = read_line(input)?;

    let kind = match parse_mode(&choice) {
        Ok(kind) => kind,
        Err(err) => return Ok(Err(err)),
    };
    let path = match kind {
        SourceKind::Image | SourceKind::Video => {
            write!(output, "Enter {} path: ", kind).context("write path prompt")?;
            output.flush().context("flush path prompt")?;
            Some(read_line(input)?)
        }
        SourceKind::Webcam => None,
    };
    Ok(Selection::parse(&choice, path.as_deref()))
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).context("read selection")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn numbers_and_words_select_the_same_mode() {
        assert_eq!(
            Selection::parse("1", Some("crowd.jpg")).unwrap(),
            Selection::parse("Image", Some("crowd.jpg")).unwrap()
        );
        assert_eq!(Selection::parse("2", Some("a.mp4")).unwrap().kind, SourceKind::Video);
        let webcam = Selection::parse("webcam", None).unwrap();
        assert_eq!(webcam.kind, SourceKind::Webcam);
        assert_eq!(webcam.locator, "");
    }

    #[test]
    fn file_modes_require_a_path() {
        for mode in ["image", "video"] {
            for path in [None, Some(""), Some("   ")] {
                let err = Selection::parse(mode, path).unwrap_err();
                assert!(matches!(err, PipelineError::MissingLocator { .. }));
                assert!(err.is_user_input());
            }
        }
    }

    #[test]
    fn unknown_choice_is_invalid() {
        let err = Selection::parse("4", Some("x")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidModeSelection { ref choice } if choice == "4"));
    }

    #[test]
    fn menu_reads_choice_then_path() -> Result<()> {
        let mut input = Cursor::new("2\nclips/entrance.mp4\n");
        let mut output = Vec::new();
        let selection = prompt(&mut input, &mut output)?.unwrap();

        assert_eq!(selection.kind, SourceKind::Video);
        assert_eq!(selection.locator, "clips/entrance.mp4");
        let shown = String::from_utf8(output)?;
        assert!(shown.starts_with("Choose an option:\n1. Process Image\n"));
        assert!(shown.ends_with("Enter video path: "));
        Ok(())
    }

    #[test]
    fn menu_webcam_asks_no_path() -> Result<()> {
        let mut input = Cursor::new("3\n");
        let mut output = Vec::new();
        let selection = prompt(&mut input, &mut output)?.unwrap();
        assert_eq!(selection.kind, SourceKind::Webcam);
        assert!(!String::from_utf8(output)?.contains("path"));
        Ok(())
    }

    #[test]
    fn menu_invalid_choice_does_not_prompt_for_path() -> Result<()> {
        let mut input = Cursor::new("9\n");
        let mut output = Vec::new();
        let err = prompt(&mut input, &mut output)?.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidModeSelection { .. }));
        Ok(())
    }
}
