//! Game window lookup
//!
//! Finds the game's top-level window by case-insensitive substring hints on
//! the process name and window title, validates its geometry and retries
//! while the OS settles window positions after a focus change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::Duration;

use super::{BackendError, DesktopBackend, WindowInfo};
use crate::config::WindowSettings;
use crate::geometry::WindowRect;

/// Why a matched window was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    /// Width or height below the configured minimum
    TooSmall { width: u32, height: u32 },
    /// Origin further offscreen than one full window size
    Offscreen { x: i32, y: i32 },
    /// The window is minimized
    Minimized,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::TooSmall { width, height } => {
                write!(f, "window too small ({}x{})", width, height)
            }
            InvalidReason::Offscreen { x, y } => write!(f, "window offscreen at ({}, {})", x, y),
            InvalidReason::Minimized => write!(f, "window is minimized"),
        }
    }
}

/// Window lookup errors
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("No window matches hints {0:?}")]
    WindowNotFound(Vec<String>),
    #[error("Window '{title}' rejected: {reason}")]
    WindowInvalid { title: String, reason: InvalidReason },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A resolved game window, owned by whichever loop resolved it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedWindow {
    /// Window rectangle in desktop pixels
    pub rect: WindowRect,
    /// True when no real window was found and the primary display stands in
    pub degraded: bool,
    /// Owning application name
    pub app_name: String,
    /// Window title
    pub title: String,
}

impl TrackedWindow {
    fn from_window(info: &WindowInfo) -> Self {
        Self {
            rect: info.rect,
            degraded: false,
            app_name: info.app_name.clone(),
            title: info.title.clone(),
        }
    }
}

/// Check window geometry for signs of a stale or minimized window
///
/// Negative origins are fine (monitors left of or above the primary) as
/// long as the window is not more than its own size off the origin.
pub fn validate_rect(rect: &WindowRect, min_size: u32) -> Result<(), InvalidReason> {
    if rect.width < min_size || rect.height < min_size {
        return Err(InvalidReason::TooSmall {
            width: rect.width,
            height: rect.height,
        });
    }

    if (rect.x as i64) < -(rect.width as i64) || (rect.y as i64) < -(rect.height as i64) {
        return Err(InvalidReason::Offscreen {
            x: rect.x,
            y: rect.y,
        });
    }

    Ok(())
}

/// Locates the game window
#[derive(Debug, Clone)]
pub struct WindowLocator {
    settings: WindowSettings,
    hints: Vec<String>,
}

impl WindowLocator {
    /// Create a locator; hints are lower-cased once here
    pub fn new(settings: WindowSettings) -> Self {
        let hints = settings
            .hints
            .iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { settings, hints }
    }

    /// Whether a window's process name or title matches any hint
    pub fn matches(&self, window: &WindowInfo) -> bool {
        let title = window.title.to_lowercase();
        let app = window.app_name.to_lowercase();
        self.hints
            .iter()
            .any(|hint| title.contains(hint.as_str()) || app.contains(hint.as_str()))
    }

    /// Single query: first matching window, validated
    pub fn find_once(&self, backend: &dyn DesktopBackend) -> Result<TrackedWindow, LocateError> {
        let windows = backend.windows()?;

        let Some(window) = windows.iter().find(|w| self.matches(w)) else {
            return Err(LocateError::WindowNotFound(self.settings.hints.clone()));
        };

        log::debug!(
            "Matched window '{}' ({}) at {}",
            window.title,
            window.app_name,
            window.rect
        );

        let invalid = |reason| LocateError::WindowInvalid {
            title: window.title.clone(),
            reason,
        };

        if window.minimized {
            return Err(invalid(InvalidReason::Minimized));
        }
        validate_rect(&window.rect, self.settings.min_size).map_err(invalid)?;

        Ok(TrackedWindow::from_window(window))
    }

    /// Query with retries while the window geometry settles
    ///
    /// Not-found and invalid results are retried; backend failures are not.
    pub fn locate(&self, backend: &dyn DesktopBackend) -> Result<TrackedWindow, LocateError> {
        let attempts = self.settings.max_attempts.max(1);
        let delay = Duration::from_millis(self.settings.retry_delay_ms);

        let mut attempt = 1;
        loop {
            match self.find_once(backend) {
                Ok(window) => {
                    log::info!("Found game window '{}' at {}", window.title, window.rect);
                    return Ok(window);
                }
                Err(LocateError::Backend(e)) => return Err(LocateError::Backend(e)),
                Err(e) if attempt >= attempts => {
                    log::warn!("Giving up after {} attempts: {}", attempts, e);
                    return Err(e);
                }
                Err(e) => {
                    log::debug!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    attempt += 1;
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
            }
        }
    }

    /// Locate the window, falling back to the primary display when allowed
    ///
    /// The fallback is flagged through [`TrackedWindow::degraded`].
    pub fn resolve(&self, backend: &dyn DesktopBackend) -> Result<TrackedWindow, LocateError> {
        match self.locate(backend) {
            Ok(window) => Ok(window),
            Err(LocateError::Backend(e)) => Err(LocateError::Backend(e)),
            Err(e) if self.settings.fallback_to_primary => {
                let display = backend.primary_display()?;
                log::warn!(
                    "{}; using primary display {} at {} instead",
                    e,
                    display.name,
                    display.rect
                );
                Ok(TrackedWindow {
                    rect: display.rect,
                    degraded: true,
                    app_name: String::new(),
                    title: display.name,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::fake::FakeDesktop;

    fn settings() -> WindowSettings {
        WindowSettings {
            retry_delay_ms: 0,
            max_attempts: 3,
            ..WindowSettings::default()
        }
    }

    fn game_window(rect: WindowRect) -> WindowInfo {
        WindowInfo {
            app_name: "Mini Motorways".to_string(),
            title: "Mini Motorways".to_string(),
            rect,
            minimized: false,
        }
    }

    #[test]
    fn test_secondary_monitor_left_is_valid() {
        assert!(validate_rect(&WindowRect::new(-1920, 0, 1920, 1080), 100).is_ok());
    }

    #[test]
    fn test_far_offscreen_is_rejected() {
        let result = validate_rect(&WindowRect::new(-5000, 0, 1920, 1080), 100);
        assert_eq!(result, Err(InvalidReason::Offscreen { x: -5000, y: 0 }));
    }

    #[test]
    fn test_tiny_window_is_rejected() {
        let result = validate_rect(&WindowRect::new(0, 0, 80, 600), 100);
        assert!(matches!(result, Err(InvalidReason::TooSmall { .. })));
    }

    #[test]
    fn test_hint_matching_is_case_insensitive() {
        let locator = WindowLocator::new(settings());
        let mut window = game_window(WindowRect::new(0, 0, 800, 600));
        window.app_name = "steam".to_string();
        window.title = "MINI MOTORWAYS - Steam".to_string();
        assert!(locator.matches(&window));

        window.title = "Terminal".to_string();
        assert!(!locator.matches(&window));
    }

    #[test]
    fn test_first_match_wins() {
        let mut desktop = FakeDesktop::single_display(1920, 1080);
        let mut other = game_window(WindowRect::new(0, 0, 500, 500));
        other.app_name = "Finder".to_string();
        other.title = "Downloads".to_string();
        desktop.windows = vec![
            other,
            game_window(WindowRect::new(10, 20, 1280, 720)),
            game_window(WindowRect::new(30, 40, 640, 480)),
        ];

        let window = WindowLocator::new(settings()).find_once(&desktop).unwrap();
        assert_eq!(window.rect, WindowRect::new(10, 20, 1280, 720));
        assert!(!window.degraded);
    }

    #[test]
    fn test_not_found_and_invalid_are_distinct() {
        let locator = WindowLocator::new(settings());
        let mut desktop = FakeDesktop::single_display(1920, 1080);

        let err = locator.locate(&desktop).unwrap_err();
        assert!(matches!(err, LocateError::WindowNotFound(_)));

        desktop.windows = vec![game_window(WindowRect::new(-5000, 0, 1920, 1080))];
        let err = locator.locate(&desktop).unwrap_err();
        assert!(matches!(
            err,
            LocateError::WindowInvalid {
                reason: InvalidReason::Offscreen { .. },
                ..
            }
        ));

        let mut minimized = game_window(WindowRect::new(0, 0, 1280, 720));
        minimized.minimized = true;
        desktop.windows = vec![minimized];
        let err = locator.locate(&desktop).unwrap_err();
        assert!(matches!(
            err,
            LocateError::WindowInvalid {
                reason: InvalidReason::Minimized,
                ..
            }
        ));
    }

    #[test]
    fn test_retries_until_window_settles() {
        let desktop = FakeDesktop::single_display(1920, 1080);
        // Window only appears on the third enumeration
        desktop.set_window_schedule(vec![
            vec![],
            vec![game_window(WindowRect::new(0, 0, 20, 20))],
            vec![game_window(WindowRect::new(100, 100, 1280, 720))],
        ]);

        let window = WindowLocator::new(settings()).locate(&desktop).unwrap();
        assert_eq!(window.rect, WindowRect::new(100, 100, 1280, 720));
        assert_eq!(desktop.window_queries(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let desktop = FakeDesktop::single_display(1920, 1080);
        let result = WindowLocator::new(settings()).locate(&desktop);
        assert!(result.is_err());
        assert_eq!(desktop.window_queries(), 3);
    }

    #[test]
    fn test_fallback_to_primary_display_is_flagged() {
        let desktop = FakeDesktop::dual_display();
        let window = WindowLocator::new(settings()).resolve(&desktop).unwrap();

        assert!(window.degraded);
        assert_eq!(window.rect, WindowRect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn test_fallback_can_be_disabled() {
        let desktop = FakeDesktop::dual_display();
        let locator = WindowLocator::new(WindowSettings {
            fallback_to_primary: false,
            ..settings()
        });
        assert!(matches!(
            locator.resolve(&desktop),
            Err(LocateError::WindowNotFound(_))
        ));
    }

    #[test]
    fn test_backend_failure_is_not_retried() {
        let desktop = FakeDesktop::single_display(1920, 1080);
        desktop.fail_window_enumeration();

        let err = WindowLocator::new(settings()).resolve(&desktop).unwrap_err();
        assert!(matches!(err, LocateError::Backend(_)));
        assert_eq!(desktop.window_queries(), 1);
    }
}
