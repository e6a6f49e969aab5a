//! Input dispatch module
//!
//! Mouse and keyboard actions against the desktop, plus click
//! humanization. The pipeline only talks to [`ActionDispatcher`].

pub mod dispatcher;
#[cfg(test)]
pub(crate) mod fake;
pub mod humanize;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::desktop::TrackedWindow;
use crate::geometry::ScreenPoint;

pub use dispatcher::EnigoDispatcher;
pub use humanize::Humanizer;

/// Input dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to connect to the input backend: {0}")]
    Connect(String),
    #[error("Input rejected: {0}")]
    Input(String),
    #[error("Window activation failed: {0}")]
    Activation(String),
}

/// Keys the pilot may press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPress {
    Escape,
    Space,
    Enter,
    Char(char),
}

impl fmt::Display for KeyPress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPress::Escape => write!(f, "Escape"),
            KeyPress::Space => write!(f, "Space"),
            KeyPress::Enter => write!(f, "Enter"),
            KeyPress::Char(c) => write!(f, "'{}'", c),
        }
    }
}

/// Sends input to the desktop
pub trait ActionDispatcher {
    /// Bring the game window to the foreground
    fn activate(&mut self, window: &TrackedWindow) -> Result<(), DispatchError>;

    /// Left click at an absolute desktop position
    fn click(&mut self, point: ScreenPoint) -> Result<(), DispatchError>;

    fn press_key(&mut self, key: KeyPress) -> Result<(), DispatchError>;
}
