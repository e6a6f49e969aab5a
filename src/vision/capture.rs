//! Screen capture
//!
//! Produces a [`Frame`] covering a window rectangle (or the whole virtual
//! desktop) by compositing per-display captures. Displays may have
//! different pixel densities; the frame uses the highest density among the
//! displays it touches, so a Retina capture is twice the logical size.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::{CaptureSpace, Frame, FrameError};
use crate::desktop::{BackendError, DesktopBackend, DisplayInfo};
use crate::geometry::WindowRect;

/// Capture errors
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Capture rectangle {0} is empty")]
    EmptyRect(WindowRect),
    #[error("Capture rectangle {0} does not overlap any display")]
    OffScreen(WindowRect),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Captures frames through a [`DesktopBackend`]
#[derive(Debug, Clone, Default)]
pub struct FrameCapturer;

impl FrameCapturer {
    pub fn new() -> Self {
        Self
    }

    /// Capture `rect` in desktop pixels, or the whole virtual desktop when `None`
    pub fn capture(
        &self,
        backend: &dyn DesktopBackend,
        rect: Option<&WindowRect>,
    ) -> Result<Frame, CaptureError> {
        let displays = backend.displays()?;

        let (target, space) = match rect {
            Some(rect) if rect.is_empty() => return Err(CaptureError::EmptyRect(*rect)),
            Some(rect) => (*rect, CaptureSpace::Window(*rect)),
            None => {
                let desktop = WindowRect::union_all(displays.iter().map(|d| &d.rect))
                    .ok_or(BackendError::NoDisplays)?;
                (desktop, CaptureSpace::Desktop(desktop))
            }
        };

        let touching: Vec<&DisplayInfo> = displays
            .iter()
            .filter(|d| d.rect.intersection(&target).is_some())
            .collect();
        if touching.is_empty() {
            return Err(CaptureError::OffScreen(target));
        }

        let mut shots = Vec::with_capacity(touching.len());
        for display in touching {
            let image = backend.capture_display(display)?;
            log::trace!(
                "Captured display {} ({}x{} px for {})",
                display.id,
                image.width(),
                image.height(),
                display.rect
            );
            shots.push((display, image));
        }

        let scale = shots
            .iter()
            .map(|(display, image)| pixel_scale(display, image))
            .fold(1.0_f64, f64::max);

        let canvas = composite(target, scale, shots);
        log::debug!(
            "Captured {}x{} frame for {} (scale {:.2})",
            canvas.width(),
            canvas.height(),
            target,
            scale
        );

        Ok(Frame::from_rgba(canvas, space)?)
    }
}

/// Physical pixels per logical pixel of a display capture
fn pixel_scale(display: &DisplayInfo, image: &RgbaImage) -> f64 {
    if display.rect.width == 0 {
        return 1.0;
    }
    image.width() as f64 / display.rect.width as f64
}

fn scaled(value: u32, scale: f64) -> u32 {
    (value as f64 * scale).round() as u32
}

/// Paste every display capture into a canvas covering `target` at `scale`
fn composite(target: WindowRect, scale: f64, shots: Vec<(&DisplayInfo, RgbaImage)>) -> RgbaImage {
    let mut canvas = RgbaImage::new(scaled(target.width, scale), scaled(target.height, scale));

    for (display, image) in shots {
        let width = scaled(display.rect.width, scale);
        let height = scaled(display.rect.height, scale);
        let image = if image.dimensions() == (width, height) {
            image
        } else {
            imageops::resize(&image, width, height, FilterType::Triangle)
        };

        let x = ((display.rect.x as i64 - target.x as i64) as f64 * scale).round() as i64;
        let y = ((display.rect.y as i64 - target.y as i64) as f64 * scale).round() as i64;
        imageops::replace(&mut canvas, &image, x, y);
    }

    canvas
}
