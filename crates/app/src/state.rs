//! Session state and status events

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Idle state - ready to capture
    Idle,
    /// Capture loop running
    Capturing,
}

impl SessionState {
    /// Get display text for current state
    pub fn display_text(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Capturing => "Capturing...",
        }
    }

    pub fn can_start(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn can_stop(&self) -> bool {
        matches!(self, SessionState::Capturing)
    }
}

/// Time left in a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemainingTime {
    Limited(Duration),
    /// No duration limit; runs until stopped
    Unbounded,
}

impl RemainingTime {
    /// Remaining part of `limit` after `elapsed`, floored at zero
    pub fn compute(limit: Option<Duration>, elapsed: Duration) -> Self {
        match limit {
            Some(limit) => RemainingTime::Limited(limit.saturating_sub(elapsed)),
            None => RemainingTime::Unbounded,
        }
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemainingTime::Limited(d) => {
                // Round to the nearest second
                let secs = (d.as_millis() + 500) / 1000;
                write!(f, "{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
            }
            RemainingTime::Unbounded => f.write_str("Manual Stop"),
        }
    }
}

/// Lets the first `Remaining` update through, then one in every `every`
#[derive(Debug, Clone, Copy)]
pub struct ProgressThrottle {
    every: u32,
    seen: u32,
}

impl ProgressThrottle {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }

    pub fn should_report(&mut self) -> bool {
        let report = self.seen % self.every == 0;
        self.seen = self.seen.wrapping_add(1);
        report
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called or the scheduler was dropped
    Requested,
    /// The configured duration elapsed
    DurationElapsed,
}

/// Status updates for the UI side
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    Captured { count: u64, path: PathBuf },
    CaptureFailed(String),
    WriteFailed(String),
    Remaining(RemainingTime),
    Stopped { reason: StopReason, captured: u64 },
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub captured: u64,
}
