//! Motorways Pilot - screen-perception automation for Mini Motorways
//!
//! This library locates the game window on the desktop, captures it,
//! classifies which screen the game is showing from colour statistics,
//! detects clickable UI elements and maps them back to desktop
//! coordinates so an input dispatcher can click them.
//!
//! ## Pipeline
//!
//! Window Locator → Frame Capturer → State Classifier / Element Detector
//! → Coordinate Mapper → Action Dispatcher. Each stage is a plain value
//! owned by [`Pilot`]; platform access goes through the
//! [`desktop::DesktopBackend`] and [`input::ActionDispatcher`] traits.

pub mod analysis;
pub mod config;
pub mod desktop;
pub mod geometry;
pub mod input;
pub mod perception;
pub mod vision;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::analysis::{AnalysisError, AnalysisRecord};
use crate::config::{ConfigError, Settings};
use crate::desktop::{DesktopBackend, LocateError, TrackedWindow, WindowLocator};
use crate::geometry::ScreenPoint;
use crate::input::{ActionDispatcher, DispatchError, Humanizer, KeyPress};
use crate::perception::{Observation, Perception};
use crate::vision::artifacts::{ArtifactError, ArtifactWriter};
use crate::vision::elements::kinds;
use crate::vision::{CaptureError, CoordinateMapper, Frame, FrameCapturer, GameState, MapError};

/// Errors surfaced by the pilot
#[derive(Debug, thiserror::Error)]
pub enum PilotError {
    #[error(transparent)]
    Locate(#[from] LocateError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("Timed out after {waited_ms} ms waiting for {target} (last seen: {last})")]
    Timeout {
        target: GameState,
        last: GameState,
        waited_ms: u64,
    },
    #[error("Cancelled")]
    Cancelled,
}

/// Actions the pilot can take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PilotAction {
    /// No action needed
    None,
    /// Left click at an absolute desktop position
    Click {
        x: i32,
        y: i32,
        /// Element type being clicked
        target: String,
    },
    /// Press a key
    Key { key: KeyPress },
    /// Observe again after a delay
    Wait { duration_ms: u64 },
    /// The window moved since the frame was captured; resolve it again
    Relocate,
}

/// What [`Pilot::start_run`] did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub window: TrackedWindow,
    /// State before clicking
    pub initial_state: GameState,
    /// Where the play button was clicked, if it was
    pub clicked: Option<ScreenPoint>,
    /// State once the transition animation settled
    pub final_state: Option<GameState>,
    pub state_changed: bool,
}

/// Ties the pipeline stages together over one desktop backend
pub struct Pilot<B: DesktopBackend> {
    backend: B,
    settings: Settings,
    locator: WindowLocator,
    capturer: FrameCapturer,
    perception: Perception,
    mapper: CoordinateMapper,
    humanizer: Humanizer,
    artifacts: Option<ArtifactWriter>,
}

impl<B: DesktopBackend> Pilot<B> {
    /// Create a pilot; settings are validated first
    pub fn new(backend: B, settings: Settings) -> Result<Self, PilotError> {
        settings.validate()?;

        let artifacts = if settings.debug.enabled() {
            Some(ArtifactWriter::create(&settings.debug)?)
        } else {
            None
        };

        Ok(Self {
            locator: WindowLocator::new(settings.window.clone()),
            capturer: FrameCapturer::new(),
            perception: Perception::new(&settings),
            mapper: CoordinateMapper::new(),
            humanizer: Humanizer::new(settings.humanize.clone()),
            artifacts,
            backend,
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn perception(&self) -> &Perception {
        &self.perception
    }

    /// Find the game window, falling back to the primary display when allowed
    pub fn resolve_window(&self) -> Result<TrackedWindow, PilotError> {
        Ok(self.locator.resolve(&self.backend)?)
    }

    /// Capture the window, or the whole virtual desktop when `None`
    pub fn capture(&self, window: Option<&TrackedWindow>) -> Result<Frame, PilotError> {
        Ok(self
            .capturer
            .capture(&self.backend, window.map(|w| &w.rect))?)
    }

    /// Capture and analyze the window once
    pub fn observe(&mut self, window: &TrackedWindow) -> Result<Observation, PilotError> {
        let frame = self.capture(Some(window))?;
        let observation = self.perception.observe(frame);
        self.save_artifacts(&observation);
        Ok(observation)
    }

    // Debug output never interrupts the run
    fn save_artifacts(&mut self, observation: &Observation) {
        let Some(writer) = self.artifacts.as_mut() else {
            return;
        };
        let label = observation.state.as_str();
        if let Err(e) = writer.save_raw(&observation.frame, label) {
            log::warn!("{}", e);
        }
        if let Err(e) = writer.save_annotated(&observation.frame, &observation.detections, label) {
            log::warn!("{}", e);
        }
    }

    /// Decide the next action from an observation
    ///
    /// The recommended element's center is mapped to the desktop and
    /// checked against the window's current rectangle; a miss means the
    /// window moved and yields [`PilotAction::Relocate`].
    pub fn plan(&self, observation: &Observation, window: &TrackedWindow) -> PilotAction {
        let Some(target) = observation.detections.target() else {
            return match observation.state {
                GameState::GamePlaying => PilotAction::None,
                _ => PilotAction::Wait {
                    duration_ms: self.settings.timings.poll_interval_ms,
                },
            };
        };

        let mapped = self
            .mapper
            .frame_to_screen(target.center, &target.source)
            .and_then(|point| self.mapper.ensure_within(point, &window.rect));

        match mapped {
            Ok(point) => PilotAction::Click {
                x: point.x,
                y: point.y,
                target: target.kind.clone(),
            },
            Err(MapError::OutOfBounds { point, rect }) => {
                log::warn!("{} is outside {}; window moved", point, rect);
                PilotAction::Relocate
            }
            Err(MapError::Unmapped) => PilotAction::None,
        }
    }

    /// Carry out one action
    ///
    /// Clicks are jittered when humanization is on, always staying inside
    /// the window. `Relocate` is left to the caller.
    pub fn execute(
        &mut self,
        action: &PilotAction,
        window: &TrackedWindow,
        dispatcher: &mut dyn ActionDispatcher,
    ) -> Result<(), PilotError> {
        match action {
            PilotAction::None | PilotAction::Relocate => {}
            PilotAction::Click { x, y, target } => {
                let point = self
                    .humanizer
                    .click_position(ScreenPoint::new(*x, *y), &window.rect);
                log::info!("Clicking {} at {}", target, point);
                dispatcher.click(point)?;
            }
            PilotAction::Key { key } => dispatcher.press_key(*key)?,
            PilotAction::Wait { duration_ms } => {
                thread::sleep(Duration::from_millis(self.humanizer.delay(*duration_ms)));
            }
        }
        Ok(())
    }

    /// Observe repeatedly until `target` is seen
    pub fn wait_for_state(
        &mut self,
        window: &TrackedWindow,
        target: GameState,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<Observation, PilotError> {
        let poll = Duration::from_millis(self.settings.timings.poll_interval_ms);
        let started = Instant::now();

        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(PilotError::Cancelled);
            }

            let observation = self.observe(window)?;
            if observation.state == target {
                log::info!("Reached {} after {:?}", target, started.elapsed());
                return Ok(observation);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(PilotError::Timeout {
                    target,
                    last: observation.state,
                    waited_ms: elapsed.as_millis() as u64,
                });
            }
            thread::sleep(poll.min(timeout - elapsed));
        }
    }

    /// Start a city from the main menu
    ///
    /// Resolves and activates the window, clicks the play button when the
    /// main menu is showing, waits for the transition and reports whether
    /// the screen changed. The window is looked up again right before the
    /// click; if it moved since the capture, the frame is stale and the
    /// screen is observed once more at the new position.
    pub fn start_run(
        &mut self,
        dispatcher: &mut dyn ActionDispatcher,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome, PilotError> {
        let mut window = self.resolve_window()?;
        dispatcher.activate(&window)?;

        let mut observation = self.observe(&window)?;
        let initial_state = observation.state;

        let mut outcome = RunOutcome {
            window: window.clone(),
            initial_state,
            clicked: None,
            final_state: None,
            state_changed: false,
        };

        if initial_state != GameState::MainMenu {
            log::warn!("Not on the main menu (seeing {})", initial_state);
            return Ok(outcome);
        }

        let mut relocated = false;
        let point = loop {
            let Some(play) = observation.detections.best(kinds::PLAY_BUTTON) else {
                log::warn!("Play button not found");
                return Ok(outcome);
            };
            let point = self.mapper.frame_to_screen(play.center, &play.source)?;

            let current = self.recheck_window(&window)?;
            if current.rect == window.rect {
                break self.mapper.ensure_within(point, &current.rect)?;
            }
            if relocated {
                return Err(MapError::OutOfBounds {
                    point,
                    rect: current.rect,
                }
                .into());
            }

            log::warn!(
                "Window moved from {} to {}; observing again",
                window.rect,
                current.rect
            );
            relocated = true;
            window = current;
            observation = self.observe(&window)?;
        };

        if cancel.load(Ordering::Relaxed) {
            return Err(PilotError::Cancelled);
        }
        let action = PilotAction::Click {
            x: point.x,
            y: point.y,
            target: kinds::PLAY_BUTTON.to_string(),
        };
        self.execute(&action, &window, dispatcher)?;
        outcome.clicked = Some(point);
        outcome.window = window.clone();

        self.settle(cancel)?;

        let after = self.observe(&window)?;
        outcome.final_state = Some(after.state);
        outcome.state_changed = after.state != initial_state;
        if outcome.state_changed {
            log::info!("State changed from {} to {}", initial_state, after.state);
        } else {
            log::warn!("State did not change after clicking play");
        }

        Ok(outcome)
    }

    /// Where the window is now
    ///
    /// A degraded window is the display itself and never moves. A window
    /// that vanished or became invalid is resolved again.
    fn recheck_window(&self, window: &TrackedWindow) -> Result<TrackedWindow, PilotError> {
        if window.degraded {
            return Ok(window.clone());
        }
        match self.locator.find_once(&self.backend) {
            Ok(current) => Ok(current),
            Err(LocateError::Backend(e)) => Err(LocateError::Backend(e).into()),
            Err(e) => {
                log::warn!("Lost the game window ({}); resolving again", e);
                self.resolve_window()
            }
        }
    }

    /// Wait out the transition animation, checking for cancellation
    fn settle(&self, cancel: &AtomicBool) -> Result<(), PilotError> {
        let deadline = Instant::now() + Duration::from_millis(self.settings.timings.animation_settle_ms);
        let step = Duration::from_millis(self.settings.timings.poll_interval_ms);
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(PilotError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(step.min(deadline - now));
        }
    }

    /// Run perception over saved screenshots
    pub fn analyze(&self, path: &Path) -> Result<Vec<AnalysisRecord>, PilotError> {
        Ok(analysis::analyze(&self.perception, path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::fake::FakeDesktop;
    use crate::desktop::WindowInfo;
    use crate::geometry::WindowRect;
    use crate::input::fake::{Dispatched, RecordingDispatcher};
    use crate::vision::test_frames::{GRASS_GREEN, PLAY_TEAL, ROAD_GRAY, WHITE};
    use crate::vision::RecommendedAction;
    use image::{Rgba, RgbaImage};
    use std::rc::Rc;

    const GAME_RECT: WindowRect = WindowRect {
        x: 100,
        y: 100,
        width: 800,
        height: 600,
    };

    fn fast_settings() -> Settings {
        let mut settings = Settings::precise();
        settings.window.retry_delay_ms = 0;
        settings.window.max_attempts = 2;
        settings.timings.animation_settle_ms = 0;
        settings.timings.poll_interval_ms = 5;
        settings
    }

    fn game_window(rect: WindowRect) -> WindowInfo {
        WindowInfo {
            app_name: "Mini Motorways".to_string(),
            title: "Mini Motorways".to_string(),
            rect,
            minimized: false,
        }
    }

    /// White menu with a teal play button near the bottom center of the window
    fn menu_desktop() -> FakeDesktop {
        let mut desktop = FakeDesktop::single_display(1280, 800);
        desktop.windows = vec![game_window(GAME_RECT)];
        desktop.paint(GAME_RECT, WHITE);
        desktop.paint(WindowRect::new(450, 580, 100, 40), PLAY_TEAL);
        desktop
    }

    /// Road across the top, grass below
    fn city_screen() -> RgbaImage {
        RgbaImage::from_fn(1280, 800, |_, y| {
            let [r, g, b] = if y < 300 { ROAD_GRAY } else { GRASS_GREEN };
            Rgba([r, g, b, 255])
        })
    }

    #[test]
    fn test_observe_main_menu() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();
        let observation = pilot.observe(&window).unwrap();

        assert_eq!(window.rect, GAME_RECT);
        assert_eq!(observation.state, GameState::MainMenu);
        assert_eq!(
            observation.detections.recommended_action(),
            RecommendedAction::ClickPlay
        );
        let play = observation.detections.best(kinds::PLAY_BUTTON).unwrap();
        assert_eq!(play.center.x, 400);
        assert_eq!(play.center.y, 500);
    }

    #[test]
    fn test_plan_maps_play_button_to_desktop() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();
        let observation = pilot.observe(&window).unwrap();

        assert_eq!(
            pilot.plan(&observation, &window),
            PilotAction::Click {
                x: 500,
                y: 600,
                target: kinds::PLAY_BUTTON.to_string(),
            }
        );
    }

    #[test]
    fn test_plan_relocates_when_window_moved() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();
        let observation = pilot.observe(&window).unwrap();

        let moved = TrackedWindow {
            rect: WindowRect::new(900, 100, 300, 300),
            ..window
        };
        assert_eq!(pilot.plan(&observation, &moved), PilotAction::Relocate);
    }

    #[test]
    fn test_plan_without_target() {
        let desktop = FakeDesktop::single_display(1280, 800);
        desktop.show(1, city_screen());
        let mut pilot = Pilot::new(desktop, fast_settings()).unwrap();

        let window = pilot.resolve_window().unwrap();
        assert!(window.degraded);
        let observation = pilot.observe(&window).unwrap();

        assert_eq!(observation.state, GameState::GamePlaying);
        assert_eq!(pilot.plan(&observation, &window), PilotAction::None);
    }

    #[test]
    fn test_plan_waits_on_unrecognised_screen() {
        let mut pilot = Pilot::new(FakeDesktop::single_display(640, 480), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();
        let observation = pilot.observe(&window).unwrap();

        assert_eq!(observation.state, GameState::Unknown);
        assert_eq!(
            pilot.plan(&observation, &window),
            PilotAction::Wait { duration_ms: 5 }
        );
    }

    #[test]
    fn test_start_run_clicks_play_and_sees_city() {
        let desktop = Rc::new(menu_desktop());
        let mut pilot = Pilot::new(Rc::clone(&desktop), fast_settings()).unwrap();

        let screen = Rc::clone(&desktop);
        let mut dispatcher = RecordingDispatcher {
            on_click: Some(Box::new(move |_: ScreenPoint| screen.show(1, city_screen()))),
            ..Default::default()
        };

        let outcome = pilot
            .start_run(&mut dispatcher, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(outcome.initial_state, GameState::MainMenu);
        assert_eq!(outcome.clicked, Some(ScreenPoint::new(500, 600)));
        assert_eq!(outcome.final_state, Some(GameState::GamePlaying));
        assert!(outcome.state_changed);
        assert!(matches!(dispatcher.actions[0], Dispatched::Activate(_)));
        assert_eq!(dispatcher.clicks(), vec![ScreenPoint::new(500, 600)]);
    }

    #[test]
    fn test_start_run_follows_window_moved_before_click() {
        let moved = WindowRect::new(160, 130, 800, 600);
        let mut desktop = menu_desktop();
        desktop.paint(moved, WHITE);
        desktop.paint(WindowRect::new(510, 610, 100, 40), PLAY_TEAL);
        // First lookup sees the old position, every later one the new
        desktop.set_window_schedule(vec![vec![game_window(GAME_RECT)]]);
        desktop.windows = vec![game_window(moved)];

        let desktop = Rc::new(desktop);
        let mut pilot = Pilot::new(Rc::clone(&desktop), fast_settings()).unwrap();
        let mut dispatcher = RecordingDispatcher::default();

        let outcome = pilot
            .start_run(&mut dispatcher, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(outcome.window.rect, moved);
        assert_eq!(outcome.clicked, Some(ScreenPoint::new(560, 630)));
        assert_eq!(dispatcher.clicks(), vec![ScreenPoint::new(560, 630)]);
        assert_eq!(desktop.window_queries(), 3);
    }

    #[test]
    fn test_start_run_reports_unchanged_screen() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let mut dispatcher = RecordingDispatcher::default();

        let outcome = pilot
            .start_run(&mut dispatcher, &AtomicBool::new(false))
            .unwrap();

        assert!(outcome.clicked.is_some());
        assert_eq!(outcome.final_state, Some(GameState::MainMenu));
        assert!(!outcome.state_changed);
    }

    #[test]
    fn test_start_run_off_menu_does_not_click() {
        let desktop = FakeDesktop::single_display(1280, 800);
        desktop.show(1, city_screen());
        let mut pilot = Pilot::new(desktop, fast_settings()).unwrap();
        let mut dispatcher = RecordingDispatcher::default();

        let outcome = pilot
            .start_run(&mut dispatcher, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(outcome.initial_state, GameState::GamePlaying);
        assert!(outcome.clicked.is_none());
        assert!(dispatcher.clicks().is_empty());
    }

    #[test]
    fn test_start_run_cancelled_before_click() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let mut dispatcher = RecordingDispatcher::default();

        let result = pilot.start_run(&mut dispatcher, &AtomicBool::new(true));

        assert!(matches!(result, Err(PilotError::Cancelled)));
        assert!(dispatcher.clicks().is_empty());
    }

    #[test]
    fn test_dispatch_failure_propagates() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let mut dispatcher = RecordingDispatcher {
            fail_clicks: true,
            ..Default::default()
        };

        let result = pilot.start_run(&mut dispatcher, &AtomicBool::new(false));
        assert!(matches!(result, Err(PilotError::Dispatch(_))));
    }

    #[test]
    fn test_wait_for_state_times_out() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();

        let result = pilot.wait_for_state(
            &window,
            GameState::GamePlaying,
            Duration::from_millis(20),
            &AtomicBool::new(false),
        );
        assert!(matches!(
            result,
            Err(PilotError::Timeout {
                target: GameState::GamePlaying,
                last: GameState::MainMenu,
                ..
            })
        ));
    }

    #[test]
    fn test_wait_for_state_returns_when_reached() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();

        let observation = pilot
            .wait_for_state(
                &window,
                GameState::MainMenu,
                Duration::from_secs(5),
                &AtomicBool::new(false),
            )
            .unwrap();
        assert_eq!(observation.state, GameState::MainMenu);
    }

    #[test]
    fn test_wait_for_state_honours_cancel() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();

        let result = pilot.wait_for_state(
            &window,
            GameState::GamePlaying,
            Duration::from_secs(60),
            &AtomicBool::new(true),
        );
        assert!(matches!(result, Err(PilotError::Cancelled)));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut settings = fast_settings();
        settings.window.hints.clear();
        assert!(matches!(
            Pilot::new(menu_desktop(), settings),
            Err(PilotError::Config(_))
        ));
    }

    #[test]
    fn test_debug_artifacts_written_per_observation() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = fast_settings();
        settings.debug.artifact_dir = root.path().to_path_buf();
        settings.debug.save_raw = true;
        settings.debug.save_annotated = true;

        let mut pilot = Pilot::new(menu_desktop(), settings).unwrap();
        let window = pilot.resolve_window().unwrap();
        pilot.observe(&window).unwrap();

        let session = std::fs::read_dir(root.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        assert_eq!(std::fs::read_dir(session).unwrap().count(), 2);
    }

    #[test]
    fn test_key_and_none_actions() {
        let mut pilot = Pilot::new(menu_desktop(), fast_settings()).unwrap();
        let window = pilot.resolve_window().unwrap();
        let mut dispatcher = RecordingDispatcher::default();

        pilot
            .execute(&PilotAction::Key { key: KeyPress::Escape }, &window, &mut dispatcher)
            .unwrap();
        pilot
            .execute(&PilotAction::None, &window, &mut dispatcher)
            .unwrap();

        assert_eq!(dispatcher.actions, vec![Dispatched::Key(KeyPress::Escape)]);
    }
}
