//! Desktop access module
//!
//! Enumerates OS windows and displays, captures display pixels, and
//! locates the game window among everything that is on screen.

#[cfg(test)]
pub(crate) mod fake;
pub mod locator;
pub mod xcap_backend;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::geometry::WindowRect;

pub use locator::{InvalidReason, LocateError, TrackedWindow, WindowLocator};
pub use xcap_backend::XcapDesktop;

/// A top-level window as reported by the OS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Owning process / application name
    pub app_name: String,
    /// Window title
    pub title: String,
    /// Window rectangle in desktop pixels
    pub rect: WindowRect,
    /// Whether the window is minimized
    pub minimized: bool,
}

/// A physical display as reported by the OS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    /// Backend-specific display id
    pub id: u32,
    /// Display name
    pub name: String,
    /// Logical rectangle in desktop pixels
    pub rect: WindowRect,
    /// Physical pixels per logical pixel
    pub scale_factor: f32,
    /// Whether this is the primary display
    pub is_primary: bool,
}

/// Platform seam for window enumeration and pixel capture
pub trait DesktopBackend {
    /// All top-level windows, front to back where the OS reports an order
    fn windows(&self) -> Result<Vec<WindowInfo>, BackendError>;

    /// All attached displays
    fn displays(&self) -> Result<Vec<DisplayInfo>, BackendError>;

    /// Capture the full contents of one display
    fn capture_display(&self, display: &DisplayInfo) -> Result<RgbaImage, BackendError>;

    /// The primary display, falling back to the first one reported
    fn primary_display(&self) -> Result<DisplayInfo, BackendError> {
        let displays = self.displays()?;
        displays
            .iter()
            .find(|d| d.is_primary)
            .or_else(|| displays.first())
            .cloned()
            .ok_or(BackendError::NoDisplays)
    }
}

/// Desktop backend errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to enumerate windows: {0}")]
    WindowEnumeration(String),
    #[error("Failed to enumerate displays: {0}")]
    DisplayEnumeration(String),
    #[error("No displays attached")]
    NoDisplays,
    #[error("Display {0} is no longer attached")]
    DisplayGone(u32),
    #[error("Screen capture failed: {0}")]
    Capture(String),
}
