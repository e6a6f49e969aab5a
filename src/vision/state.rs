//! Game-state classification
//!
//! Frame-local and stateless: colour coverage for a handful of role bands
//! is measured and a fixed list of predicates is tried in priority order,
//! first match wins. There is no transition model between frames.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::color::{bands, ColorCatalog, ColorCoverage, HsvFrame};
use super::Frame;

/// Background coverage above which the strict menu test applies
const MENU_BACKGROUND_MIN: f64 = 0.8;
/// Background coverage that alone implies the main menu
const MENU_BACKGROUND_FALLBACK: f64 = 0.9;
/// Accepted range of menu-blue coverage on the main menu
const MENU_BLUE_RANGE: (f64, f64) = (0.01, 0.10);
/// Minimum coverage of either accent colour on the main menu
const MENU_ACCENT_MIN: f64 = 0.005;
/// Minimum road coverage while a city is being played
const PLAYING_ROAD_MIN: f64 = 0.1;
/// Minimum grass coverage while a city is being played
const PLAYING_GRASS_MIN: f64 = 0.2;

/// Screen the game is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    /// Title screen with the play button
    MainMenu,
    /// City picker
    CitySelection,
    /// A city is being played
    GamePlaying,
    /// Pause overlay
    GamePaused,
    /// Run finished
    GameOver,
    /// Nothing matched
    #[default]
    Unknown,
}

impl GameState {
    pub const ALL: [GameState; 6] = [
        GameState::MainMenu,
        GameState::CitySelection,
        GameState::GamePlaying,
        GameState::GamePaused,
        GameState::GameOver,
        GameState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::MainMenu => "main_menu",
            GameState::CitySelection => "city_selection",
            GameState::GamePlaying => "game_playing",
            GameState::GamePaused => "game_paused",
            GameState::GameOver => "game_over",
            GameState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown game state '{}'", s))
    }
}

/// Which catalog band plays which role in the predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRules {
    pub background_band: String,
    pub blue_band: String,
    pub yellow_band: String,
    pub orange_band: String,
    pub road_band: String,
    pub grass_band: String,
}

impl Default for StateRules {
    fn default() -> Self {
        Self {
            background_band: bands::MENU_BACKGROUND.to_string(),
            blue_band: bands::MENU_BLUE.to_string(),
            yellow_band: bands::ACCENT_YELLOW.to_string(),
            orange_band: bands::ACCENT_ORANGE.to_string(),
            road_band: bands::ROAD_GRAY.to_string(),
            grass_band: bands::GRASS_GREEN.to_string(),
        }
    }
}

impl StateRules {
    fn band_names(&self) -> [&str; 6] {
        [
            &self.background_band,
            &self.blue_band,
            &self.yellow_band,
            &self.orange_band,
            &self.road_band,
            &self.grass_band,
        ]
    }
}

/// Assigns a [`GameState`] to a frame from colour coverage alone
#[derive(Debug, Clone)]
pub struct StateClassifier {
    catalog: ColorCatalog,
    rules: StateRules,
}

impl StateClassifier {
    pub fn new(catalog: ColorCatalog, rules: StateRules) -> Self {
        for name in rules.band_names() {
            if catalog.get(name).is_none() {
                log::warn!("State rule band '{}' is not in the catalog; it reads as 0", name);
            }
        }
        Self { catalog, rules }
    }

    /// Classify a frame
    pub fn classify(&self, frame: &Frame) -> GameState {
        self.classify_with_coverage(frame).0
    }

    /// Classify a frame and return the evidence used
    pub fn classify_with_coverage(&self, frame: &Frame) -> (GameState, ColorCoverage) {
        self.classify_hsv(&HsvFrame::from_frame(frame))
    }

    /// Classify an already converted frame
    pub fn classify_hsv(&self, hsv: &HsvFrame) -> (GameState, ColorCoverage) {
        let coverage = hsv.coverage(self.catalog.select(&self.rules.band_names()));
        let state = self.classify_coverage(&coverage);
        (state, coverage)
    }

    /// Evaluate the predicates in priority order
    pub fn classify_coverage(&self, coverage: &ColorCoverage) -> GameState {
        let predicates: [(GameState, fn(&Self, &ColorCoverage) -> bool); 5] = [
            (GameState::MainMenu, Self::is_main_menu),
            (GameState::CitySelection, Self::is_city_selection),
            (GameState::GamePlaying, Self::is_game_playing),
            (GameState::GamePaused, Self::is_game_paused),
            (GameState::GameOver, Self::is_game_over),
        ];

        predicates
            .iter()
            .find(|(_, predicate)| predicate(self, coverage))
            .map(|(state, _)| *state)
            .unwrap_or(GameState::Unknown)
    }

    fn is_main_menu(&self, coverage: &ColorCoverage) -> bool {
        let background = coverage.get(&self.rules.background_band);
        let blue = coverage.get(&self.rules.blue_band);
        let yellow = coverage.get(&self.rules.yellow_band);
        let orange = coverage.get(&self.rules.orange_band);

        let strict = background > MENU_BACKGROUND_MIN
            && (MENU_BLUE_RANGE.0..=MENU_BLUE_RANGE.1).contains(&blue)
            && (yellow > MENU_ACCENT_MIN || orange > MENU_ACCENT_MIN);
        if strict {
            log::debug!(
                "Main menu: background {:.3}, blue {:.3}, yellow {:.3}, orange {:.3}",
                background,
                blue,
                yellow,
                orange
            );
            return true;
        }

        if background > MENU_BACKGROUND_FALLBACK {
            log::debug!("Main menu (background only): {:.3}", background);
            return true;
        }

        false
    }

    // No reliable colour signature known yet
    fn is_city_selection(&self, _coverage: &ColorCoverage) -> bool {
        false
    }

    fn is_game_playing(&self, coverage: &ColorCoverage) -> bool {
        let road = coverage.get(&self.rules.road_band);
        let grass = coverage.get(&self.rules.grass_band);

        let playing = road > PLAYING_ROAD_MIN && grass > PLAYING_GRASS_MIN;
        if playing {
            log::debug!("Game playing: road {:.3}, grass {:.3}", road, grass);
        }
        playing
    }

    fn is_game_paused(&self, _coverage: &ColorCoverage) -> bool {
        false
    }

    fn is_game_over(&self, _coverage: &ColorCoverage) -> bool {
        false
    }
}
