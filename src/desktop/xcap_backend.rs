//! `xcap`-backed desktop access
//!
//! Works on Windows, macOS and X11/Wayland through the `xcap` crate. On
//! macOS the host terminal needs the Screen Recording permission, otherwise
//! captures come back empty or fail.

use image::RgbaImage;
use xcap::{Monitor, Window, XCapResult};

use super::{BackendError, DesktopBackend, DisplayInfo, WindowInfo};
use crate::geometry::WindowRect;

/// Desktop backend over `xcap`
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapDesktop;

impl XcapDesktop {
    pub fn new() -> Self {
        Self
    }
}

fn window_info(window: &Window) -> XCapResult<WindowInfo> {
    Ok(WindowInfo {
        app_name: window.app_name()?,
        title: window.title()?,
        rect: WindowRect::new(window.x()?, window.y()?, window.width()?, window.height()?),
        minimized: window.is_minimized()?,
    })
}

fn display_info(monitor: &Monitor) -> XCapResult<DisplayInfo> {
    Ok(DisplayInfo {
        id: monitor.id()?,
        name: monitor.name()?,
        rect: WindowRect::new(monitor.x()?, monitor.y()?, monitor.width()?, monitor.height()?),
        scale_factor: monitor.scale_factor()?,
        is_primary: monitor.is_primary()?,
    })
}

impl DesktopBackend for XcapDesktop {
    fn windows(&self) -> Result<Vec<WindowInfo>, BackendError> {
        let windows = Window::all().map_err(|e| BackendError::WindowEnumeration(e.to_string()))?;

        let mut infos = Vec::with_capacity(windows.len());
        for window in &windows {
            // System windows regularly refuse attribute queries; skip them.
            match window_info(window) {
                Ok(info) => infos.push(info),
                Err(e) => log::trace!("Skipping unreadable window: {}", e),
            }
        }

        log::debug!("Enumerated {} windows", infos.len());
        Ok(infos)
    }

    fn displays(&self) -> Result<Vec<DisplayInfo>, BackendError> {
        let monitors =
            Monitor::all().map_err(|e| BackendError::DisplayEnumeration(e.to_string()))?;

        monitors
            .iter()
            .map(|m| display_info(m).map_err(|e| BackendError::DisplayEnumeration(e.to_string())))
            .collect()
    }

    fn capture_display(&self, display: &DisplayInfo) -> Result<RgbaImage, BackendError> {
        let monitors =
            Monitor::all().map_err(|e| BackendError::DisplayEnumeration(e.to_string()))?;

        let monitor = monitors
            .into_iter()
            .find(|m| m.id().map(|id| id == display.id).unwrap_or(false))
            .ok_or(BackendError::DisplayGone(display.id))?;

        let image = monitor
            .capture_image()
            .map_err(|e| BackendError::Capture(e.to_string()))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(BackendError::Capture(format!(
                "display {} returned an empty image (missing screen recording permission?)",
                display.name
            )));
        }

        Ok(image)
    }
}
