//! WindowShot - capture one window to PNG files at a fixed interval

use anyhow::{bail, Context, Result};
use app::{CaptureScheduler, Config, ProgressThrottle, SessionEvent, SessionState, StartOutcome};
use capture_gdi::{SystemBackend, SystemWindows, WindowCapturer, WindowCatalog, WindowHandle};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::{bounded, never, select, Receiver};
use export::{count_png_files, PngSink};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Remaining-time updates arrive once per second; show one in ten at info level
const PROGRESS_LOG_EVERY: u32 = 10;

#[derive(Parser)]
#[command(name = "windowshot", version, about = "Periodically capture a window to PNG files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List windows that can be captured
    List,
    /// Remember a window as the capture target
    Select {
        /// Handle as printed by `list`
        handle: isize,
    },
    /// Capture the selected window until stopped or the duration elapses
    Run(RunArgs),
    /// Show the config file location and contents
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Window handle, overrides the selected window
    #[arg(long)]
    window: Option<isize>,
    /// Milliseconds between captures (at least 100)
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Minutes to capture, 0 for manual stop
    #[arg(long)]
    duration_min: Option<u64>,
    #[arg(long)]
    save_dir: Option<PathBuf>,
    /// Write the overrides back to the config file
    #[arg(long)]
    save: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Window rectangles in physical pixels
    #[cfg(windows)]
    unsafe {
        use windows::Win32::UI::HiDpi::{
            SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
        };
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
    }

    let cli = Cli::parse();
    let cfg = Config::load().context("failed to load configuration")?;

    match cli.command {
        Command::List => list_windows(&cfg),
        Command::Select { handle } => select_window(cfg, WindowHandle(handle)),
        Command::Run(args) => run(cfg, args),
        Command::Config => show_config(&cfg),
    }
}

fn list_windows(cfg: &Config) -> Result<()> {
    let catalog = WindowCatalog::with_filter(SystemWindows, cfg.title_filter());
    let windows = catalog.list_visible_windows().context("failed to get window list")?;

    if windows.is_empty() {
        println!("No visible application windows were found.");
        return Ok(());
    }

    let selected = cfg.selected_window.handle();
    for win in &windows {
        let marker = if win.handle == selected { '*' } else { ' ' };
        println!("{} [{}] {}", marker, win.handle, win.title);
    }
    Ok(())
}

fn select_window(mut cfg: Config, handle: WindowHandle) -> Result<()> {
    let catalog = WindowCatalog::with_filter(SystemWindows, cfg.title_filter());
    let Some(window) = catalog.find(handle).context("failed to get window list")? else {
        bail!("window {} is not in the list of visible windows", handle);
    };

    cfg.select_window(&window);
    let path = cfg.save().context("failed to save configuration")?;
    println!("Selected [{}] {} (saved to {})", window.handle, window.title, path.display());
    Ok(())
}

fn show_config(cfg: &Config) -> Result<()> {
    match app::config::config_path() {
        Ok(path) => println!("# {}", path.display()),
        Err(e) => println!("# {}", e),
    }
    println!("{}", serde_json::to_string_pretty(cfg)?);
    Ok(())
}

fn run(mut cfg: Config, args: RunArgs) -> Result<()> {
    if let Some(hwnd) = args.window {
        cfg.selected_window.hwnd = hwnd;
        cfg.selected_window.title.clear();
    }
    if let Some(ms) = args.interval_ms {
        cfg.interval_ms = ms;
    }
    if let Some(minutes) = args.duration_min {
        cfg.capture_duration = minutes;
    }
    if let Some(dir) = args.save_dir {
        cfg.save_directory = dir;
    }
    cfg.validate()?;

    if args.save {
        cfg.save().context("failed to save configuration")?;
    }

    let (scheduler, events) = CaptureScheduler::new(WindowCapturer::new(SystemBackend), PngSink);

    match scheduler.start(&cfg.capture_config()) {
        Ok(StartOutcome::Started) => {}
        Ok(StartOutcome::AlreadyCapturing) => bail!("a capture session is already running"),
        Err(e) => bail!("cannot start capture: {}", e),
    }

    info!(
        window = %cfg.selected_window.handle(),
        title = %cfg.selected_window.title,
        "capturing, press Enter to stop"
    );

    let mut throttle = ProgressThrottle::new(PROGRESS_LOG_EVERY);
    let mut stop_rx = spawn_stdin_watcher();
    loop {
        select! {
            recv(stop_rx) -> msg => match msg {
                Ok(()) => {
                    scheduler.stop();
                }
                // stdin closed: only the duration limit can end the session now
                Err(_) => stop_rx = never(),
            },
            recv(events) -> event => match event {
                Ok(SessionEvent::Stopped { reason, captured }) => {
                    info!(?reason, captured, "Status: {}", SessionState::Idle.display_text());
                    break;
                }
                Ok(event) => report(event, &mut throttle),
                Err(_) => break,
            },
        }
    }
    scheduler.wait();

    match count_png_files(&cfg.save_directory) {
        Ok(n) => info!("{} screenshots in {}", n, cfg.save_directory.display()),
        Err(e) => warn!("could not list {}: {}", cfg.save_directory.display(), e),
    }
    Ok(())
}

/// Fires once when a line is read from stdin
fn spawn_stdin_watcher() -> Receiver<()> {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        if let Ok(n) = std::io::stdin().lock().read_line(&mut line) {
            if n > 0 {
                let _ = tx.send(());
            }
        }
    });
    rx
}

fn report(event: SessionEvent, throttle: &mut ProgressThrottle) {
    match event {
        SessionEvent::Started => info!("Status: {}", SessionState::Capturing.display_text()),
        SessionEvent::Captured { count, path } => {
            info!(count, "Screenshots: {} ({})", count, path.display())
        }
        SessionEvent::CaptureFailed(e) => warn!("Error capturing screenshot: {}", e),
        SessionEvent::WriteFailed(e) => warn!("Error saving screenshot: {}", e),
        SessionEvent::Remaining(remaining) => {
            if throttle.should_report() {
                info!("Remaining: {}", remaining);
            } else {
                debug!("Remaining: {}", remaining);
            }
        }
        SessionEvent::Stopped { .. } => {}
    }
}
