//! GDI window capture module for WindowShot
//!
//! Enumerates top-level windows and captures a single window into an RGBA image
//! using `PrintWindow`, falling back to `BitBlt`.

pub mod capture;
pub mod catalog;
pub mod convert;

pub use capture::{CaptureBackend, CaptureStrategy, CaptureSurface, CapturedImage, WindowCapturer};
pub use catalog::{RawWindow, TitleFilter, WindowCatalog, WindowSource};
pub use convert::bgra_to_rgba;

// ── Platform split ─────────────────────────────────────────────────────────────

#[cfg(windows)]
mod gdi;
#[cfg(windows)]
pub use gdi::{GdiBackend as SystemBackend, GdiWindows as SystemWindows};

#[cfg(not(windows))]
mod stub;
#[cfg(not(windows))]
pub use stub::{UnsupportedBackend as SystemBackend, UnsupportedWindows as SystemWindows};

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("window enumeration failed: {0}")]
    Enumeration(String),

    #[error("window handle {handle} is no longer valid: {reason}")]
    HandleInvalid { handle: WindowHandle, reason: String },

    #[error("device context error: {0}")]
    DeviceContext(String),

    #[error("bitmap conversion failed: {0}")]
    Conversion(String),

    #[error("window capture is not supported on this platform")]
    NotSupported,
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Captured pixels, RGBA, top-down rows
pub type PixelImage = image::RgbaImage;

/// Opaque OS window handle. Zero means "no window".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<isize> for WindowHandle {
    fn from(raw: isize) -> Self {
        WindowHandle(raw)
    }
}

/// A selectable top-level window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub title: String,
}

/// Rectangle in screen pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from left/top/right/bottom edges. `None` when the area is empty.
    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Option<Self> {
        let width = right.checked_sub(left)?;
        let height = bottom.checked_sub(top)?;
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self::new(left, top, width as u32, height as u32))
    }
}
