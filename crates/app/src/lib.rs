//! WindowShot - periodic window screenshots
//!
//! Session control for the capture pipeline: persisted settings, the timed
//! scheduler and the status events it reports.

pub mod config;
pub mod scheduler;
pub mod state;

pub use config::{Config, ConfigError};
pub use scheduler::{CaptureConfig, CaptureScheduler, FrameSource, StartError, StartOutcome};
pub use state::{
    ProgressThrottle, RemainingTime, SessionEvent, SessionState, SessionStatus, StopReason,
};
