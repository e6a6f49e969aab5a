//! Vision and image processing module
//!
//! Screen capture, colour statistics, game-state classification, UI
//! element detection and frame-to-screen coordinate mapping.

pub mod artifacts;
pub mod capture;
pub mod color;
pub mod elements;
pub mod mapping;
pub mod state;

use image::{DynamicImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geometry::WindowRect;

pub use capture::{CaptureError, FrameCapturer};
pub use color::{ColorBand, ColorCatalog, ColorCoverage, HsvFrame};
pub use elements::{
    DetectionReport, ElementDetector, ElementTypeSpec, RecommendedAction, ScreenPosition,
    UiCandidate,
};
pub use mapping::{CoordinateMapper, MapError};
pub use state::{GameState, StateClassifier};

/// Coordinate space a frame was captured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureSpace {
    /// Captured exactly over a window rectangle
    Window(WindowRect),
    /// Captured over (part of) the virtual desktop, in absolute coordinates
    Desktop(WindowRect),
    /// Loaded from disk, no known screen position
    Unmapped,
}

/// Size and capture space of a frame, detached from its pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub space: CaptureSpace,
}

/// One captured still image, immutable once built
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    space: CaptureSpace,
}

impl Frame {
    /// Wrap an RGB image
    pub fn new(image: RgbImage, space: CaptureSpace) -> Result<Self, FrameError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FrameError::Empty);
        }
        Ok(Self { image, space })
    }

    /// Wrap an RGBA capture, dropping the alpha channel
    pub fn from_rgba(image: RgbaImage, space: CaptureSpace) -> Result<Self, FrameError> {
        Self::new(DynamicImage::ImageRgba8(image).to_rgb8(), space)
    }

    /// Load a screenshot from disk as an unmapped frame
    pub fn load(path: &Path) -> Result<Self, FrameError> {
        let image = image::open(path).map_err(|e| FrameError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::new(image.to_rgb8(), CaptureSpace::Unmapped)
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn space(&self) -> CaptureSpace {
        self.space
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            width: self.width(),
            height: self.height(),
            space: self.space,
        }
    }
}

/// Frame construction errors
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame has no pixels")]
    Empty,
    #[error("Failed to load image {path}: {reason}")]
    Load { path: String, reason: String },
}

#[cfg(test)]
pub(crate) mod test_frames {
    //! Synthetic frames built from horizontal colour stripes

    use image::{ImageBuffer, Rgb, RgbImage};

    use super::{CaptureSpace, Frame};

    /// Stripes of `(fraction, rgb)` top to bottom over a 100x100 frame
    pub fn striped(stripes: &[(f64, [u8; 3])]) -> Frame {
        let height = 100u32;
        let mut rows = Vec::with_capacity(height as usize);
        for &(fraction, color) in stripes {
            let count = (fraction * height as f64).round() as usize;
            rows.extend(std::iter::repeat(color).take(count));
        }
        let fill = rows.last().copied().unwrap_or([0, 0, 0]);
        rows.resize(height as usize, fill);

        let image: RgbImage = ImageBuffer::from_fn(100, height, |_, y| Rgb(rows[y as usize]));
        Frame::new(image, CaptureSpace::Unmapped).unwrap()
    }

    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Frame {
        let image: RgbImage = ImageBuffer::from_pixel(width, height, Rgb(color));
        Frame::new(image, CaptureSpace::Unmapped).unwrap()
    }

    pub const WHITE: [u8; 3] = [255, 255, 255];
    pub const MENU_BLUE: [u8; 3] = [70, 130, 200];
    pub const ACCENT_YELLOW: [u8; 3] = [240, 200, 40];
    pub const ROAD_GRAY: [u8; 3] = [90, 90, 90];
    pub const GRASS_GREEN: [u8; 3] = [60, 160, 60];
    pub const BRICK_RED: [u8; 3] = [150, 30, 30];
    pub const PLAY_TEAL: [u8; 3] = [40, 180, 160];
}
