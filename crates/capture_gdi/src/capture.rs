//! Window capture core

use crate::convert::bgra_to_rgba;
use crate::{CaptureError, CaptureResult, PixelImage, Rect, WindowHandle};
use tracing::{debug, warn};

/// An off-screen drawing target sized to one window.
///
/// Implementations own every OS resource they acquire and release it on drop.
pub trait CaptureSurface {
    /// Primary path: ask the window to render itself, chrome and children included.
    fn render_window(&mut self) -> CaptureResult<()>;

    /// Fallback path: block-copy from the window's live surface.
    fn copy_from_screen(&mut self) -> CaptureResult<()>;

    /// Put back whatever was selected into the drawing target before rendering.
    /// Called once rendering is done and before `read_bgra`.
    fn deselect(&mut self);

    /// Read the surface back as top-down 32bpp BGRA rows.
    fn read_bgra(&self) -> CaptureResult<Vec<u8>>;
}

/// Source of window geometry and capture surfaces
pub trait CaptureBackend {
    type Surface: CaptureSurface;

    /// Current bounding rectangle of the window, in screen coordinates
    fn window_bounds(&self, handle: WindowHandle) -> CaptureResult<Rect>;

    /// Acquire the window's device context and a compatible off-screen target
    fn open_surface(&self, handle: WindowHandle, bounds: Rect) -> CaptureResult<Self::Surface>;
}

/// Which path produced the pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStrategy {
    PrintWindow,
    BlockCopy,
}

/// Capture result with the strategy that produced it
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub image: PixelImage,
    pub strategy: CaptureStrategy,
}

/// Captures one window at a time through a backend
pub struct WindowCapturer<B> {
    backend: B,
}

impl<B: CaptureBackend> WindowCapturer<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Capture the window's visible contents
    pub fn capture(&self, handle: WindowHandle) -> CaptureResult<PixelImage> {
        self.capture_detailed(handle).map(|captured| captured.image)
    }

    /// Capture and report which strategy succeeded
    pub fn capture_detailed(&self, handle: WindowHandle) -> CaptureResult<CapturedImage> {
        let bounds = self.backend.window_bounds(handle)?;
        let mut surface = self.backend.open_surface(handle, bounds)?;

        let strategy = render(&mut surface, handle)?;
        debug!(%handle, ?strategy, width = bounds.width, height = bounds.height, "window rendered");

        surface.deselect();
        let bgra = surface.read_bgra()?;
        // Release the GDI objects before the conversion pass
        drop(surface);

        let image = bgra_to_rgba(bounds.width, bounds.height, bgra)?;
        Ok(CapturedImage { image, strategy })
    }
}

/// Primary render, then block copy if the window refused to print itself.
fn render<S: CaptureSurface>(
    surface: &mut S,
    handle: WindowHandle,
) -> CaptureResult<CaptureStrategy> {
    match surface.render_window() {
        Ok(()) => Ok(CaptureStrategy::PrintWindow),
        Err(primary) => {
            warn!(%handle, error = %primary, "PrintWindow failed, falling back to BitBlt");
            surface.copy_from_screen().map_err(|fallback| {
                CaptureError::DeviceContext(format!(
                    "both capture paths failed (PrintWindow: {}; BitBlt: {})",
                    primary, fallback
                ))
            })?;
            Ok(CaptureStrategy::BlockCopy)
        }
    }
}
