use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser, ValueEnum};

use lensgrab::capture::{
    CaptureManager, CaptureMode, CaptureOutcome, CaptureRequest, CaptureRun, CaptureSettings,
    ExportOutcome, Rect, RunOutcome, ScreenCaptureMode, destinations::build_destinations,
};
use lensgrab::config::{Config, SessionState};
use lensgrab::notification::{Notice, send_notification};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Select a region (or use --rect)
    Region,
    /// Capture a display (see --screen)
    FullScreen,
    /// Capture the focused window
    ActiveWindow,
    /// Pick a window interactively
    Window,
    /// Repeat the previous region
    LastRegion,
    /// Import an image file (requires --file)
    File,
    /// Import the image on the clipboard
    Clipboard,
}

impl From<ModeArg> for CaptureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Region => CaptureMode::Region,
            ModeArg::FullScreen => CaptureMode::FullScreen,
            ModeArg::ActiveWindow => CaptureMode::ActiveWindow,
            ModeArg::Window => CaptureMode::Window,
            ModeArg::LastRegion => CaptureMode::LastRegion,
            ModeArg::File => CaptureMode::File,
            ModeArg::Clipboard => CaptureMode::Clipboard,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lensgrab")]
#[command(
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("LENSGRAB_GIT_HASH"), ")"),
    about = "Screenshot capture tool for Wayland compositors"
)]
struct Cli {
    /// What to capture
    #[arg(long, short = 'm', value_enum, default_value_t = ModeArg::Region)]
    mode: ModeArg,

    /// Region to capture without selecting it, as x,y,width,height
    #[arg(long, short = 'r', value_name = "X,Y,W,H")]
    rect: Option<Rect>,

    /// Display for full screen captures: auto, full or a display index
    #[arg(long, short = 's', value_name = "SCREEN")]
    screen: Option<ScreenCaptureMode>,

    /// Image to import with --mode file
    #[arg(long, short = 'f', value_name = "PATH")]
    file: Option<PathBuf>,

    /// Destination for the capture (repeatable, defaults to the configured list)
    #[arg(long = "destination", short = 'd', value_name = "NAME")]
    destinations: Vec<String>,

    /// Include the mouse pointer
    #[arg(long, short = 'p', action = ArgAction::SetTrue)]
    pointer: bool,

    /// Delay before capturing, in milliseconds
    #[arg(long, value_name = "MS")]
    delay: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.mode == ModeArg::File && cli.file.is_none() {
        return Err(anyhow!("--mode file requires --file PATH"));
    }
    if cli.rect.is_some() && cli.mode != ModeArg::Region {
        log::warn!("--rect only applies to --mode region, ignoring it");
    }

    if std::env::var("WAYLAND_DISPLAY").is_err() && cli.mode != ModeArg::File {
        log::error!("WAYLAND_DISPLAY not set - this application requires Wayland.");
        log::error!("Please run on a Wayland compositor (Hyprland, Sway, etc.).");
        return Err(anyhow!("Wayland environment required"));
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {e:#}");
        Config::default()
    });
    if let Some(delay) = cli.delay {
        config.capture.capture_delay_ms = delay;
    }
    let state = SessionState::load().unwrap_or_else(|e| {
        log::warn!("Failed to locate capture state: {e:#}");
        SessionState::default()
    });

    let configured = build_destinations(&config.capture.output_destinations, &config);
    let settings = CaptureSettings::from_config(&config, &state, configured);

    let mut request = CaptureRequest::new(cli.mode.into()).with_pointer(cli.pointer);
    if let Some(rect) = cli.rect
        && cli.mode == ModeArg::Region
    {
        request = request.with_region(rect);
    }
    if let Some(screen) = cli.screen {
        request = request.with_screen_mode(screen);
    }
    if let Some(file) = cli.file {
        request = request.with_file(file);
    }
    for destination in build_destinations(&cli.destinations, &config) {
        request = request.with_destination(destination);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let manager = CaptureManager::new(runtime.handle(), settings);
    manager.request_capture(request)?;

    let (outcome, state) = runtime.block_on(async {
        let outcome = loop {
            if let Some(outcome) = manager.take_result().await {
                break outcome;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        };
        let state = manager.settings().lock().await.session_state();
        (outcome, state)
    });

    if let Err(e) = state.save() {
        log::warn!("Failed to save capture state: {e:#}");
    }

    match outcome {
        CaptureOutcome::Success(run) => {
            report(&runtime, run);
            Ok(())
        }
        CaptureOutcome::Cancelled(reason) => {
            log::info!("Capture cancelled: {}", reason);
            Ok(())
        }
        CaptureOutcome::Failed(message) => {
            notify(&runtime, &Notice::capture_failed(&message));
            Err(anyhow!("Capture failed: {message}"))
        }
    }
}

fn report(runtime: &tokio::runtime::Runtime, run: CaptureRun) {
    let report = match run.outcome {
        RunOutcome::Routed(report) => report,
        RunOutcome::NothingCaptured => {
            println!("Nothing captured");
            return;
        }
        RunOutcome::UserCancelled => return,
    };

    for notification in &report.notifications {
        match notification.outcome {
            ExportOutcome::Success => println!(
                "{}: {}",
                notification.source,
                notification.message.as_deref().unwrap_or("done")
            ),
            ExportOutcome::Failure | ExportOutcome::Cancelled => {
                eprintln!(
                    "{}: {}",
                    notification.source,
                    notification.message.as_deref().unwrap_or("cancelled")
                );
            }
        }
        if notification.outcome == ExportOutcome::Failure
            && let Some(notice) = Notice::for_export(notification)
        {
            notify(runtime, &notice);
        }
    }

    if let Some(mut retained) = report.retained {
        // Nothing in this process keeps the capture open after exit.
        log::debug!("Releasing capture retained by {:?}", retained.details.destination_names());
        retained.dispose();
    }
}

fn notify(runtime: &tokio::runtime::Runtime, notice: &Notice) {
    if let Err(e) = runtime.block_on(send_notification(notice)) {
        log::warn!("Failed to send notification: {}", e);
    }
}
