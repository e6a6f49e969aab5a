//! Pilot settings
//!
//! Every tunable of the pipeline: window lookup, colour bands, element
//! catalog, state rules, timings, click humanization and debug output.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::vision::color::ColorCatalog;
use crate::vision::elements::ElementTypeSpec;
use crate::vision::state::StateRules;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to write config {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Game window lookup
    pub window: WindowSettings,
    /// Named HSV colour bands
    pub colors: ColorCatalog,
    /// UI element catalog
    pub elements: Vec<ElementTypeSpec>,
    /// Band roles used by the state classifier
    pub states: StateRules,
    /// Delays and timeouts
    pub timings: TimingSettings,
    /// Click position and delay jitter
    pub humanize: HumanizeSettings,
    /// Debug frame output
    pub debug: DebugSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            colors: ColorCatalog::default(),
            elements: ElementTypeSpec::default_catalog(),
            states: StateRules::default(),
            timings: TimingSettings::default(),
            humanize: HumanizeSettings::default(),
            debug: DebugSettings::default(),
        }
    }
}

impl Settings {
    /// Settings that click exactly on element centers, without jitter
    pub fn precise() -> Self {
        Self {
            humanize: HumanizeSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load settings from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_json(&text)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Parse and validate settings JSON
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.hints.iter().all(|h| h.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "window.hints must contain at least one non-empty hint".to_string(),
            ));
        }

        self.colors.validate().map_err(ConfigError::Invalid)?;

        let mut names = HashSet::new();
        for spec in &self.elements {
            spec.validate().map_err(ConfigError::Invalid)?;
            if !names.insert(spec.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate element type '{}'",
                    spec.name
                )));
            }
            if self.colors.get(&spec.band).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "element type '{}' references unknown band '{}'",
                    spec.name, spec.band
                )));
            }
        }

        if self.timings.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timings.poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Game window lookup settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Case-insensitive substrings matched against process name and title
    pub hints: Vec<String>,
    /// Minimum accepted window width and height
    pub min_size: u32,
    /// Lookup attempts before giving up
    pub max_attempts: u32,
    /// Delay between attempts (ms)
    pub retry_delay_ms: u64,
    /// Use the primary display when no valid window is found
    pub fallback_to_primary: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            hints: vec!["mini motorways".to_string()],
            min_size: 100,
            max_attempts: 10,
            retry_delay_ms: 1000,
            fallback_to_primary: true,
        }
    }
}

/// Timing settings for screen interactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Wait after activating the window (ms)
    pub activation_settle_ms: u64,
    /// Wait after a click for the game's transition animation (ms)
    pub animation_settle_ms: u64,
    /// Interval between observations while waiting for a state (ms)
    pub poll_interval_ms: u64,
    /// Default timeout when waiting for a state (ms)
    pub state_timeout_ms: u64,
    /// Pause between pointer move and button press (ms)
    pub click_delay_ms: u64,
    /// Minimum time between two clicks (ms)
    pub min_click_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            activation_settle_ms: 500,
            animation_settle_ms: 3000,
            poll_interval_ms: 500,
            state_timeout_ms: 30_000,
            click_delay_ms: 100,
            min_click_interval_ms: 500,
        }
    }
}

/// Click humanization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanizeSettings {
    /// Enable jitter at all
    pub enabled: bool,
    /// Maximum click offset in pixels
    pub position_offset_max: i32,
    /// Delay variance percentage (0-100)
    pub timing_variance_percent: u32,
}

impl Default for HumanizeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            position_offset_max: 3,
            timing_variance_percent: 20,
        }
    }
}

/// Debug frame output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Root directory for per-session artifact folders
    pub artifact_dir: PathBuf,
    /// Save every captured frame
    pub save_raw: bool,
    /// Save frames with detections drawn on
    pub save_annotated: bool,
    /// Session folders older than this many days are removed when a new
    /// session starts; `None` keeps everything
    pub keep_days: Option<u32>,
}

impl DebugSettings {
    pub fn enabled(&self) -> bool {
        self.save_raw || self.save_annotated
    }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("debug_frames"),
            save_raw: false,
            save_annotated: false,
            keep_days: Some(7),
        }
    }
}
