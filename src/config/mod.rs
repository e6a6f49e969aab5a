//! Configuration module
//!
//! Handles pilot settings loaded from JSON and their built-in defaults.

pub mod settings;

pub use settings::{
    ConfigError, DebugSettings, HumanizeSettings, Settings, TimingSettings, WindowSettings,
};
