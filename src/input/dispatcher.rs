//! Real input through enigo

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse};
use std::thread::sleep;
use std::time::{Duration, Instant};

use super::{ActionDispatcher, DispatchError, KeyPress};
use crate::config::TimingSettings;
use crate::desktop::TrackedWindow;
use crate::geometry::ScreenPoint;

/// Offset of the title-strip click below the window's top edge
const TITLE_STRIP_OFFSET: i32 = 10;

/// Drives the system pointer and keyboard
pub struct EnigoDispatcher {
    enigo: Enigo,
    timings: TimingSettings,
    last_click: Option<Instant>,
}

impl EnigoDispatcher {
    pub fn new(timings: TimingSettings) -> Result<Self, DispatchError> {
        let enigo = Enigo::new(&enigo::Settings::default())
            .map_err(|e| DispatchError::Connect(e.to_string()))?;
        Ok(Self {
            enigo,
            timings,
            last_click: None,
        })
    }

    fn wait_click_interval(&self) {
        let Some(last) = self.last_click else {
            return;
        };
        let interval = Duration::from_millis(self.timings.min_click_interval_ms);
        let elapsed = last.elapsed();
        if elapsed < interval {
            log::trace!("Waiting {:?} before clicking", interval - elapsed);
            sleep(interval - elapsed);
        }
    }

    /// Focus the window by clicking the middle of its title strip
    fn activate_by_click(&mut self, window: &TrackedWindow) -> Result<(), DispatchError> {
        let rect = window.rect;
        let point = ScreenPoint::new(rect.center().x, rect.y + TITLE_STRIP_OFFSET);
        log::info!("Activating '{}' by clicking {}", window.title, point);
        self.click(point)
    }
}

impl ActionDispatcher for EnigoDispatcher {
    fn activate(&mut self, window: &TrackedWindow) -> Result<(), DispatchError> {
        if window.degraded {
            log::warn!("No real game window to activate");
            return Ok(());
        }

        if !activate_application(&window.app_name) {
            self.activate_by_click(window)?;
        }
        sleep(Duration::from_millis(self.timings.activation_settle_ms));
        Ok(())
    }

    fn click(&mut self, point: ScreenPoint) -> Result<(), DispatchError> {
        self.wait_click_interval();

        self.enigo
            .move_mouse(point.x, point.y, Coordinate::Abs)
            .map_err(|e| DispatchError::Input(e.to_string()))?;
        sleep(Duration::from_millis(self.timings.click_delay_ms));
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| DispatchError::Input(e.to_string()))?;

        self.last_click = Some(Instant::now());
        log::debug!("Clicked at {}", point);
        Ok(())
    }

    fn press_key(&mut self, key: KeyPress) -> Result<(), DispatchError> {
        let mapped = match key {
            KeyPress::Escape => Key::Escape,
            KeyPress::Space => Key::Space,
            KeyPress::Enter => Key::Return,
            KeyPress::Char(c) => Key::Unicode(c),
        };
        self.enigo
            .key(mapped, Direction::Click)
            .map_err(|e| DispatchError::Input(e.to_string()))?;
        log::debug!("Pressed {}", key);
        Ok(())
    }
}

/// Ask the OS to bring an application to the front; false when unsupported or refused
#[cfg(target_os = "macos")]
fn activate_application(app_name: &str) -> bool {
    if app_name.is_empty() {
        return false;
    }
    let script = format!(
        "tell application \"System Events\" to set frontmost of first process whose name is \"{}\" to true",
        app_name.replace('"', "")
    );
    match std::process::Command::new("osascript")
        .args(["-e", &script])
        .output()
    {
        Ok(output) if output.status.success() => {
            log::info!("Activated '{}'", app_name);
            true
        }
        Ok(output) => {
            log::warn!(
                "osascript activation failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Err(e) => {
            log::warn!("Could not run osascript: {}", e);
            false
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn activate_application(_app_name: &str) -> bool {
    false
}
