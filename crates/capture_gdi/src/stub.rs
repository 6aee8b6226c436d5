//! Non-Windows stand-ins (CI + cross-compilation).

use crate::capture::{CaptureBackend, CaptureSurface};
use crate::catalog::{RawWindow, WindowSource};
use crate::{CaptureError, CaptureResult, Rect, WindowHandle};

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedWindows;

impl WindowSource for UnsupportedWindows {
    fn top_level_windows(&self) -> CaptureResult<Vec<RawWindow>> {
        Err(CaptureError::NotSupported)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedBackend;

/// Never constructed; exists to satisfy the backend's surface type
pub enum UnsupportedSurface {}

impl CaptureSurface for UnsupportedSurface {
    fn render_window(&mut self) -> CaptureResult<()> {
        match *self {}
    }

    fn copy_from_screen(&mut self) -> CaptureResult<()> {
        match *self {}
    }

    fn deselect(&mut self) {
        match *self {}
    }

    fn read_bgra(&self) -> CaptureResult<Vec<u8>> {
        match *self {}
    }
}

impl CaptureBackend for UnsupportedBackend {
    type Surface = UnsupportedSurface;

    fn window_bounds(&self, _handle: WindowHandle) -> CaptureResult<Rect> {
        Err(CaptureError::NotSupported)
    }

    fn open_surface(
        &self,
        _handle: WindowHandle,
        _bounds: Rect,
    ) -> CaptureResult<UnsupportedSurface> {
        Err(CaptureError::NotSupported)
    }
}
