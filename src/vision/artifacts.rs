//! Debug frame output
//!
//! Writes captured frames, raw and with detections drawn on, into one
//! timestamped directory per session.

use chrono::{Duration, Local, NaiveDateTime};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::fs;
use std::path::{Path, PathBuf};

use super::elements::{kinds, DetectionReport};
use super::Frame;
use crate::config::DebugSettings;

const SESSION_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const MARKER_RADIUS: i32 = 5;
const BOX_THICKNESS: u32 = 2;

/// Artifact output errors
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to save {path}: {source}")]
    Save {
        path: String,
        source: image::ImageError,
    },
}

/// Box colour per element type
fn element_color(kind: &str) -> Rgb<u8> {
    match kind {
        kinds::PLAY_BUTTON => Rgb([0, 255, 0]),
        kinds::CITY_SELECTION => Rgb([0, 0, 255]),
        kinds::MENU_BUTTON => Rgb([255, 0, 0]),
        _ => Rgb([128, 128, 128]),
    }
}

/// Copy of the frame with every candidate's box and center drawn on
pub fn annotate(frame: &Frame, report: &DetectionReport) -> RgbImage {
    let mut image = frame.image().clone();

    for (kind, candidates) in &report.elements {
        let color = element_color(kind);
        for candidate in candidates {
            let bbox = candidate.bbox;
            for inset in 0..BOX_THICKNESS {
                if bbox.width <= 2 * inset || bbox.height <= 2 * inset {
                    break;
                }
                let rect = Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32)
                    .of_size(bbox.width - 2 * inset, bbox.height - 2 * inset);
                draw_hollow_rect_mut(&mut image, rect, color);
            }
            let center = (candidate.center.x as i32, candidate.center.y as i32);
            draw_filled_circle_mut(&mut image, center, MARKER_RADIUS, color);
        }
    }

    image
}

/// Writes debug frames for one session
#[derive(Debug)]
pub struct ArtifactWriter {
    session_dir: PathBuf,
    save_raw: bool,
    save_annotated: bool,
    sequence: u32,
}

impl ArtifactWriter {
    /// Start a session under `settings.artifact_dir`, named after the local time
    pub fn create(settings: &DebugSettings) -> Result<Self, ArtifactError> {
        Self::create_at(settings, Local::now().naive_local())
    }

    pub fn create_at(settings: &DebugSettings, started: NaiveDateTime) -> Result<Self, ArtifactError> {
        let session_dir = settings
            .artifact_dir
            .join(started.format(SESSION_FORMAT).to_string());
        fs::create_dir_all(&session_dir).map_err(|source| ArtifactError::CreateDir {
            path: session_dir.display().to_string(),
            source,
        })?;
        log::info!("Saving debug frames to {}", session_dir.display());

        if let Some(keep_days) = settings.keep_days {
            prune_sessions(&settings.artifact_dir, &session_dir, started, keep_days);
        }

        Ok(Self {
            session_dir,
            save_raw: settings.save_raw,
            save_annotated: settings.save_annotated,
            sequence: 0,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Save the frame as captured, if raw output is enabled
    pub fn save_raw(&mut self, frame: &Frame, label: &str) -> Result<Option<PathBuf>, ArtifactError> {
        if !self.save_raw {
            return Ok(None);
        }
        let path = self.next_path(label);
        save(frame.image(), &path)?;
        Ok(Some(path))
    }

    /// Save the frame with detections drawn on, if annotated output is enabled
    pub fn save_annotated(
        &mut self,
        frame: &Frame,
        report: &DetectionReport,
        label: &str,
    ) -> Result<Option<PathBuf>, ArtifactError> {
        if !self.save_annotated {
            return Ok(None);
        }
        let path = self.next_path(&format!("{}_annotated", label));
        save(&annotate(frame, report), &path)?;
        Ok(Some(path))
    }

    fn next_path(&mut self, label: &str) -> PathBuf {
        self.sequence += 1;
        self.session_dir
            .join(format!("{:04}_{}.png", self.sequence, label))
    }
}

/// Remove session folders started more than `keep_days` before `now`
///
/// Folders not named like a session are left alone. Failures are logged.
fn prune_sessions(root: &Path, current: &Path, now: NaiveDateTime, keep_days: u32) -> usize {
    let cutoff = now - Duration::days(keep_days as i64);
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {}", root.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path == current || !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| NaiveDateTime::parse_from_str(name, SESSION_FORMAT).ok());
        if !started.is_some_and(|started| started < cutoff) {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    if removed > 0 {
        log::info!("Removed {} old debug session(s)", removed);
    }
    removed
}

fn save(image: &RgbImage, path: &Path) -> Result<(), ArtifactError> {
    image.save(path).map_err(|source| ArtifactError::Save {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("Saved {}", path.display());
    Ok(())
}
