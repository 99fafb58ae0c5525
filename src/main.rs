// SPDX-License-Identifier: MIT
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

mod config;
mod dispatch;
mod headless;
mod instrument;
mod series;
mod tui;

use std::fs::{self, OpenOptions};
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::config::{DEFAULT_SETTINGS_FILE, Settings};
use crate::dispatch::dispatcher::{Dispatcher, ShutdownReport};
use crate::dispatch::queue::{ShutdownSignal, TaskSender};
use crate::dispatch::surface::DisplaySurface;
use crate::dispatch::task::{ControlCommand, DisplayCommand};
use crate::headless::{HeadlessDisplay, SharedChart};
use crate::instrument::analyser::SpectrumAnalyser;
use crate::instrument::recorder::MARKER_FILE;
use crate::tui::app::{App, Mode};
use crate::tui::input::handle_key;
use crate::tui::model::{DisplayModel, SharedModel, TuiDisplay, lock_model};

const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(50);
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);
const HEADLESS_POLL: Duration = Duration::from_millis(200);
const HEADLESS_STATUS_INTERVAL: Duration = Duration::from_secs(5);
const LOG_FILE: &str = "qcmon.log";

#[derive(Parser)]
#[command(name = "qcmon", about = "qcmon: QCM resonance monitor and recorder")]
struct Cli {
    /// Settings file (`key = value` lines)
    #[arg(short, long, global = true, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Live,
    /// Record without TUI (headless)
    Record {
        /// Instrument resource, overriding the settings file
        #[arg(short, long)]
        instrument: Option<String>,
        /// Stop after this many seconds (0 runs until interrupted)
        #[arg(long, default_value = "0")]
        duration: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.settings);

    match cli.command.unwrap_or(Commands::Live) {
        Commands::Live => cmd_live(settings),
        Commands::Record {
            instrument,
            duration,
        } => cmd_record(settings, instrument, duration),
    }
}

// ---------------------------------------------------------------------------
// Signal handling and logging
// ---------------------------------------------------------------------------

fn install_signal_handler() -> Result<ShutdownSignal> {
    let shutdown = ShutdownSignal::new();
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.flag())
        .context("failed to register SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.flag())
        .context("failed to register SIGTERM handler")?;
    Ok(shutdown)
}

/// Logs to stderr, or to `log_file` when the terminal belongs to the UI.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("failed to initialise logging")
}

fn prepare_data_folder(settings: &Settings) -> Result<()> {
    fs::create_dir_all(&settings.data_folder).with_context(|| {
        format!(
            "failed to create data folder: {}",
            settings.data_folder.display()
        )
    })
}

// ---------------------------------------------------------------------------
// Dispatcher thread
// ---------------------------------------------------------------------------

fn spawn_dispatcher<D: DisplaySurface + 'static>(
    settings: &Settings,
    shutdown: ShutdownSignal,
    display: D,
) -> Result<(TaskSender, JoinHandle<ShutdownReport>)> {
    let (sender, receiver) = dispatch::channel(settings.queue_capacity, shutdown);
    let analyser = SpectrumAnalyser::spawn(settings, sender.clone())?;
    let dispatcher = Dispatcher::new(receiver, analyser, display);
    let handle = thread::Builder::new()
        .name("dispatcher".into())
        .spawn(move || dispatcher.run())
        .context("failed to spawn dispatcher thread")?;
    Ok((sender, handle))
}

fn join_dispatcher(sender: &TaskSender, handle: JoinHandle<ShutdownReport>) -> Result<ShutdownReport> {
    sender.request_shutdown();
    handle
        .join()
        .map_err(|_| anyhow!("dispatcher thread panicked"))
}

// ---------------------------------------------------------------------------
// Terminal setup / teardown
// ---------------------------------------------------------------------------

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen)
        .context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("failed to create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Live subcommand
// ---------------------------------------------------------------------------

fn cmd_live(settings: Settings) -> Result<()> {
    let shutdown = install_signal_handler()?;
    prepare_data_folder(&settings)?;
    init_logging(Some(&settings.data_folder.join(LOG_FILE)))?;
    log::info!("qcmon {} starting", env!("CARGO_PKG_VERSION"));

    let model: SharedModel = Arc::new(Mutex::new(DisplayModel::new(&settings)));
    let display = TuiDisplay::new(Arc::clone(&model));
    let (sender, handle) = spawn_dispatcher(&settings, shutdown.clone(), display)?;

    let mut terminal = match setup_terminal() {
        Ok(terminal) => terminal,
        Err(err) => {
            if let Err(join_err) = join_dispatcher(&sender, handle) {
                log::error!("{join_err:#}");
            }
            return Err(err);
        }
    };
    let mut app = App::new(Arc::clone(&model), sender.clone(), settings);
    app.setup();

    let result = run_live_loop(&shutdown, &sender, &model, &mut app, &mut terminal);

    let report = join_dispatcher(&sender, handle);
    restore_terminal(&mut terminal)?;

    if let Err(err) = app.settings().save() {
        eprintln!("{err:#}");
    }
    let report = report?;
    for error in &report.close_errors {
        eprintln!("{error}");
    }
    log::info!(
        "session ended: {} tasks dispatched, {} failed",
        report.dispatched,
        report.failed
    );
    result
}

fn run_live_loop(
    shutdown: &ShutdownSignal,
    sender: &TaskSender,
    model: &SharedModel,
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<()> {
    let mut last_refresh = Instant::now();
    let mut redraw = true;

    loop {
        if shutdown.is_requested() || app.should_quit || lock_model(model).closed {
            break;
        }

        if event::poll(EVENT_POLL_TIMEOUT).context("failed to poll events")?
            && let Event::Key(key) = event::read().context("failed to read event")?
            && key.kind == KeyEventKind::Press
        {
            app.handle_action(handle_key(key, app.mode() == Mode::Command));
            redraw = true;
        }

        if last_refresh.elapsed() >= REFRESH_INTERVAL {
            sender.send(DisplayCommand::Refresh);
            last_refresh = Instant::now();
        }

        let mut guard = lock_model(model);
        if guard.take_dirty() || redraw {
            terminal
                .draw(|f| app.render(f, &guard))
                .context("failed to draw frame")?;
            redraw = false;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Record subcommand
// ---------------------------------------------------------------------------

fn cmd_record(mut settings: Settings, instrument: Option<String>, duration_secs: u64) -> Result<()> {
    let shutdown = install_signal_handler()?;
    init_logging(None)?;
    prepare_data_folder(&settings)?;
    if let Some(instrument) = instrument {
        settings.instrument = instrument;
    }

    let display = HeadlessDisplay::new(&settings);
    let chart = display.chart();
    let (sender, handle) = spawn_dispatcher(&settings, shutdown.clone(), display)?;

    sender.send(ControlCommand::Connect {
        target: settings.instrument.clone(),
    });
    sender.send(ControlCommand::Configure {
        start_hz: settings.start_hz,
        stop_hz: settings.stop_hz,
    });
    sender.send(ControlCommand::StartMeasuring);
    sender.send(ControlCommand::StartRecording);

    let max_duration = (duration_secs > 0).then(|| Duration::from_secs(duration_secs));
    let start = Instant::now();
    let mut last_status = Instant::now();
    let marker_log = settings.data_folder.join(MARKER_FILE);

    eprintln!(
        "Recording {} to {} ...",
        settings.instrument,
        settings.data_folder.display()
    );

    loop {
        if shutdown.is_requested() {
            eprintln!("\nInterrupted.");
            break;
        }
        if let Some(max) = max_duration
            && start.elapsed() >= max
        {
            eprintln!("\nDuration limit reached.");
            break;
        }

        thread::sleep(HEADLESS_POLL);

        if last_status.elapsed() >= HEADLESS_STATUS_INTERVAL {
            print_recording_status(start.elapsed(), &chart, &marker_log);
            last_status = Instant::now();
        }
    }

    let report = join_dispatcher(&sender, handle)?;
    for error in &report.close_errors {
        eprintln!("{error}");
    }
    eprintln!(
        "Finished: {} tasks dispatched ({} failed), markers in {}",
        report.dispatched,
        report.failed,
        marker_log.display()
    );
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn print_recording_status(elapsed: Duration, chart: &SharedChart, marker_log: &Path) {
    let secs = elapsed.as_secs();
    let (points, latest) = {
        let chart = chart.lock().unwrap_or_else(PoisonError::into_inner);
        (chart.marker().len(), chart.marker().latest())
    };
    let size = fs::metadata(marker_log).map_or(0, |m| m.len());
    let latest = latest.map_or_else(
        || "no marker yet".to_string(),
        |(_, hz)| tui::panels::header::format_hz(hz),
    );
    eprintln!(
        "  [{secs}s] {points} markers, latest {latest}, {:.1} KB logged",
        size as f64 / 1024.0
    );
}
