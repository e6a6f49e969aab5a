//! Motorways Pilot CLI
//!
//! Desktop entry point: locate the game, inspect what it shows, analyze
//! saved screenshots, or click through to a new city.

use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motorways_pilot::config::Settings;
use motorways_pilot::desktop::XcapDesktop;
use motorways_pilot::input::EnigoDispatcher;
use motorways_pilot::vision::GameState;
use motorways_pilot::{Pilot, PilotError};

#[derive(Parser, Debug)]
#[command(
    name = "pilot",
    version,
    about = "Screen-perception automation for Mini Motorways"
)]
struct Cli {
    /// Settings JSON (defaults are used for missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(long, short, global = true, action = ArgAction::SetTrue)]
    verbose: bool,
    /// Print the effective settings as JSON and exit
    #[arg(long, action = ArgAction::SetTrue)]
    dump_config: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the game window and print its rectangle
    Locate,
    /// Capture the game window to a PNG
    Capture(CaptureArgs),
    /// Capture once and print state, coverage and detections
    Observe(ObserveArgs),
    /// Analyze a saved screenshot or a directory of them
    Analyze(AnalyzeArgs),
    /// Click play on the main menu and report the resulting state
    Start,
    /// Poll until the game shows a given state
    Wait(WaitArgs),
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Output PNG path
    #[arg(long, default_value = "capture.png")]
    out: PathBuf,
    /// Capture the whole virtual desktop instead of the window
    #[arg(long, action = ArgAction::SetTrue)]
    desktop: bool,
}

#[derive(Args, Debug)]
struct ObserveArgs {
    /// Also print the action that would be taken
    #[arg(long, action = ArgAction::SetTrue)]
    plan: bool,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// PNG file or directory of PNG files
    path: PathBuf,
}

#[derive(Args, Debug)]
struct WaitArgs {
    /// Target state (main_menu, city_selection, game_playing, game_paused, game_over, unknown)
    #[arg(long)]
    state: GameState,
    /// Timeout in seconds (default from settings)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Pilot(#[from] PilotError),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to save {path}: {source}")]
    Save {
        path: String,
        source: image::ImageError,
    },
    #[error("Nothing to do; pass a subcommand or --dump-config")]
    NoCommand,
    #[error("Failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path).map_err(PilotError::from)?,
        None => Settings::default(),
    };

    if cli.dump_config {
        println!("{}", settings.to_json().map_err(PilotError::from)?);
        return Ok(());
    }

    let command = cli.command.ok_or(CliError::NoCommand)?;
    let mut pilot = Pilot::new(XcapDesktop::new(), settings)?;

    // Ctrl-C stops the pilot at its next check instead of mid-click
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        log::warn!("Stop requested");
        handler_flag.store(true, Ordering::Relaxed);
    })?;

    match command {
        Commands::Locate => print_json(&pilot.resolve_window()?),
        Commands::Capture(args) => {
            let frame = if args.desktop {
                pilot.capture(None)?
            } else {
                let window = pilot.resolve_window()?;
                pilot.capture(Some(&window))?
            };
            frame.image().save(&args.out).map_err(|source| CliError::Save {
                path: args.out.display().to_string(),
                source,
            })?;
            log::info!("Saved {}", args.out.display());
            print_json(&frame.info())
        }
        Commands::Observe(args) => {
            let window = pilot.resolve_window()?;
            let observation = pilot.observe(&window)?;
            print_json(&observation.summary())?;
            if args.plan {
                print_json(&pilot.plan(&observation, &window))?;
            }
            Ok(())
        }
        Commands::Analyze(args) => print_json(&pilot.analyze(&args.path)?),
        Commands::Start => {
            let mut dispatcher = EnigoDispatcher::new(pilot.settings().timings.clone())
                .map_err(PilotError::from)?;
            let outcome = pilot.start_run(&mut dispatcher, &cancel)?;
            print_json(&outcome)
        }
        Commands::Wait(args) => {
            let timeout = args
                .timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_millis(pilot.settings().timings.state_timeout_ms));
            let window = pilot.resolve_window()?;
            let observation = pilot.wait_for_state(&window, args.state, timeout, &cancel)?;
            print_json(&observation.summary())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
