//! Capture file naming

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

pub const FILE_PREFIX: &str = "screenshot";

/// Second-resolution timestamp embedded in every file name
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `<dir>/screenshot_<YYYY-MM-DD_HH-MM-SS>_<counter:04>.png`
pub fn sequence_file_name(save_dir: &Path, timestamp: &NaiveDateTime, counter: u32) -> PathBuf {
    save_dir.join(format!(
        "{}_{}_{:04}.png",
        FILE_PREFIX,
        timestamp.format(TIMESTAMP_FORMAT),
        counter
    ))
}

/// Per-second file sequence number.
///
/// Starts at 0 and goes back to 0 whenever a tick lands in a different wall-clock second
/// than the previous one.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    second: Option<i64>,
    value: u32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the second of the current tick and return the number to use for it
    pub fn observe(&mut self, second: i64) -> u32 {
        if self.second != Some(second) {
            if self.second.is_some() {
                self.value = 0;
            }
            self.second = Some(second);
        }
        self.value
    }

    /// Move past a number that was written successfully
    pub fn advance(&mut self) {
        self.value += 1;
    }

    pub fn value(&self) -> u32 {
        self.value
    }
}
