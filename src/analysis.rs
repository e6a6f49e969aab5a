//! Offline screenshot analysis
//!
//! Runs perception over saved PNG screenshots, one file or a whole
//! directory, so catalogs can be tuned without the game running.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::perception::{ObservationSummary, Perception};
use crate::vision::{Frame, FrameError};

/// Offline analysis errors
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("No PNG screenshots in {0}")]
    NothingToAnalyze(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Result for one screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    pub summary: ObservationSummary,
}

/// `path` itself if it is a file, otherwise its `*.png` entries sorted by name
pub fn collect_screenshots(path: &Path) -> Result<Vec<PathBuf>, AnalysisError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let read_err = |source| AnalysisError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(read_err)? {
        let file = entry.map_err(read_err)?.path();
        let is_png = file
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if is_png && file.is_file() {
            files.push(file);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(AnalysisError::NothingToAnalyze(path.display().to_string()));
    }
    Ok(files)
}

/// Analyze one screenshot or a directory of them
///
/// In directory mode unreadable images are logged and skipped.
pub fn analyze(perception: &Perception, path: &Path) -> Result<Vec<AnalysisRecord>, AnalysisError> {
    let directory = path.is_dir();
    let mut records = Vec::new();

    for file in collect_screenshots(path)? {
        let frame = match Frame::load(&file) {
            Ok(frame) => frame,
            Err(e) if directory => {
                log::warn!("Skipping {}: {}", file.display(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let summary = perception.observe(frame).summary();
        log::info!("{}: {}", file.display(), summary.state);
        records.push(AnalysisRecord {
            path: file,
            summary,
        });
    }

    Ok(records)
}
