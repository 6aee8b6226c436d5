//! Persisted settings: save directory, timing, and the selected window.

use crate::scheduler::CaptureConfig;
use capture_gdi::catalog::DEFAULT_EXCLUDED_TITLES;
use capture_gdi::{TitleFilter, WindowHandle, WindowInfo};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Shortest interval the settings accept
pub const MIN_INTERVAL_MS: u64 = 100;

const APP_DIR: &str = "windowshot";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("interval must be at least 100ms (got {0}ms)")]
    IntervalTooShort(u64),

    #[error("capture duration of {0} minutes is too long")]
    DurationTooLong(u64),

    #[error("no user config directory available")]
    NoConfigDir,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Window chosen by the user, remembered across runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSetting {
    #[serde(default)]
    pub hwnd: isize,
    #[serde(default)]
    pub title: String,
}

impl WindowSetting {
    pub fn handle(&self) -> WindowHandle {
        WindowHandle(self.hwnd)
    }
}

impl From<&WindowInfo> for WindowSetting {
    fn from(info: &WindowInfo) -> Self {
        Self {
            hwnd: info.handle.0,
            title: info.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_save_directory")]
    pub save_directory: PathBuf,
    /// Milliseconds between captures
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Minutes to keep capturing; 0 runs until stopped
    #[serde(default = "default_capture_duration")]
    pub capture_duration: u64,
    #[serde(default)]
    pub selected_window: WindowSetting,
    #[serde(default = "default_excluded_titles")]
    pub excluded_titles: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_directory: default_save_directory(),
            interval_ms: default_interval_ms(),
            capture_duration: default_capture_duration(),
            selected_window: WindowSetting::default(),
            excluded_titles: default_excluded_titles(),
        }
    }
}

// ── Defaults ───────────────────────────────────────────────────────────────

fn default_save_directory() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join("screenshots"),
        None => {
            tracing::warn!("could not get user home directory, saving under the current directory");
            PathBuf::from("screenshots")
        }
    }
}
fn default_interval_ms() -> u64 {
    1000
}

fn default_capture_duration() -> u64 {
    60
}

fn default_excluded_titles() -> Vec<String> {
    DEFAULT_EXCLUDED_TITLES.iter().map(|t| t.to_string()).collect()
}

// ── Load / save ────────────────────────────────────────────────────────────

/// `<user config dir>/windowshot/config.json`
pub fn config_path() -> ConfigResult<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join(CONFIG_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

impl Config {
    /// Load from the default location, falling back to defaults if the file is absent.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("config file not found at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let cfg = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("config loaded from {}", path.display());
        Ok(cfg)
    }

    pub fn save(&self) -> ConfigResult<PathBuf> {
        let path = config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write pretty-printed JSON, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(io::Error::from).map_err(write_err)?;
        fs::write(path, json).map_err(write_err)?;

        tracing::info!("config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms < MIN_INTERVAL_MS {
            return Err(ConfigError::IntervalTooShort(self.interval_ms));
        }
        if self.capture_duration.checked_mul(60).is_none() {
            return Err(ConfigError::DurationTooLong(self.capture_duration));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// `None` when the session should run until stopped
    pub fn duration_limit(&self) -> Option<Duration> {
        (self.capture_duration > 0)
            .then(|| Duration::from_secs(self.capture_duration.saturating_mul(60)))
    }

    pub fn title_filter(&self) -> TitleFilter {
        TitleFilter::new(self.excluded_titles.iter().cloned())
    }

    pub fn select_window(&mut self, window: &WindowInfo) {
        self.selected_window = WindowSetting::from(window);
    }

    /// Scheduler input for the current settings
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            target_window: self.selected_window.handle(),
            interval: self.interval(),
            duration: self.duration_limit(),
            save_directory: self.save_directory.clone(),
        }
    }
}
