//! Win32 GDI backend

use crate::capture::{CaptureBackend, CaptureSurface};
use crate::catalog::{RawWindow, WindowSource};
use crate::convert::{dib_buffer_len, DIB_BITS_PER_PIXEL};
use crate::{CaptureError, CaptureResult, Rect, WindowHandle};
use std::ffi::c_void;
use tracing::warn;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits,
    GetWindowDC, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, SRCCOPY,
};
use windows::Win32::Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetDesktopWindow, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    IsWindowVisible,
};

/// PW_RENDERFULLCONTENT: include DirectComposition/layered content
const PW_RENDERFULLCONTENT: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(0x0000_0002);

fn hwnd_from_handle(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

// ── Window enumeration ─────────────────────────────────────────────────────────

/// Top-level windows via `EnumWindows`
#[derive(Debug, Clone, Copy, Default)]
pub struct GdiWindows;

impl WindowSource for GdiWindows {
    fn top_level_windows(&self) -> CaptureResult<Vec<RawWindow>> {
        let mut windows: Vec<RawWindow> = Vec::new();

        unsafe {
            EnumWindows(
                Some(enum_window_callback),
                LPARAM(&mut windows as *mut Vec<RawWindow> as isize),
            )
            .map_err(|e| CaptureError::Enumeration(e.to_string()))?;
        }

        Ok(windows)
    }
}

unsafe extern "system" fn enum_window_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<RawWindow>);

    let visible = IsWindowVisible(hwnd).as_bool();
    let title = if visible { window_title(hwnd) } else { String::new() };

    windows.push(RawWindow {
        handle: WindowHandle(hwnd.0 as isize),
        visible,
        title,
    });

    BOOL(1) // Continue enumeration
}

unsafe fn window_title(hwnd: HWND) -> String {
    let len = GetWindowTextLengthW(hwnd);
    if len <= 0 {
        return String::new();
    }

    let mut buf = vec![0u16; len as usize + 1];
    let copied = GetWindowTextW(hwnd, &mut buf);
    if copied <= 0 {
        return String::new();
    }

    String::from_utf16_lossy(&buf[..copied as usize])
}

// ── Scoped GDI resources ───────────────────────────────────────────────────────

/// DC from `GetWindowDC`, released with `ReleaseDC`
struct WindowDc {
    hwnd: HWND,
    hdc: HDC,
}

impl WindowDc {
    fn acquire(hwnd: HWND) -> CaptureResult<Self> {
        let hdc = unsafe { GetWindowDC(hwnd) };
        if hdc.is_invalid() {
            return Err(CaptureError::DeviceContext(format!(
                "GetWindowDC failed: {}",
                windows::core::Error::from_win32()
            )));
        }
        Ok(Self { hwnd, hdc })
    }
}

impl Drop for WindowDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
        }
    }
}

/// Memory DC from `CreateCompatibleDC`, destroyed with `DeleteDC`
struct MemoryDc(HDC);

impl MemoryDc {
    fn compatible_with(dc: &WindowDc) -> CaptureResult<Self> {
        let hdc = unsafe { CreateCompatibleDC(dc.hdc) };
        if hdc.is_invalid() {
            return Err(CaptureError::DeviceContext("CreateCompatibleDC failed".into()));
        }
        Ok(Self(hdc))
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

/// Bitmap from `CreateCompatibleBitmap`, destroyed with `DeleteObject`
struct CompatibleBitmap(HBITMAP);

impl CompatibleBitmap {
    fn create(dc: &WindowDc, bounds: Rect) -> CaptureResult<Self> {
        let bitmap =
            unsafe { CreateCompatibleBitmap(dc.hdc, bounds.width as i32, bounds.height as i32) };
        if bitmap.0.is_null() {
            return Err(CaptureError::DeviceContext(format!(
                "CreateCompatibleBitmap failed for {}x{}",
                bounds.width, bounds.height
            )));
        }
        Ok(Self(bitmap))
    }
}

impl Drop for CompatibleBitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.0);
        }
    }
}

/// Bitmap selected into a memory DC; the previous object is put back on drop
struct Selection {
    dc: HDC,
    previous: HGDIOBJ,
}

impl Selection {
    fn select(dc: &MemoryDc, bitmap: &CompatibleBitmap) -> Self {
        let previous = unsafe { SelectObject(dc.0, bitmap.0) };
        if previous.0.is_null() {
            warn!("SelectObject returned no previous object");
        }
        Self { dc: dc.0, previous }
    }
}

impl Drop for Selection {
    fn drop(&mut self) {
        if self.previous.0.is_null() {
            return;
        }
        let restored = unsafe { SelectObject(self.dc, self.previous) };
        if restored.0.is_null() {
            warn!("failed to restore previously selected GDI object");
        }
    }
}

// ── Capture surface ────────────────────────────────────────────────────────────

/// Off-screen copy of one window.
///
/// Fields drop top to bottom: deselect, delete bitmap, delete memory DC, release window DC.
pub struct GdiSurface {
    selection: Option<Selection>,
    bitmap: CompatibleBitmap,
    memory_dc: MemoryDc,
    window_dc: WindowDc,
    hwnd: HWND,
    bounds: Rect,
}

impl CaptureSurface for GdiSurface {
    fn render_window(&mut self) -> CaptureResult<()> {
        let ok = unsafe { PrintWindow(self.hwnd, self.memory_dc.0, PW_RENDERFULLCONTENT) };
        if !ok.as_bool() {
            return Err(CaptureError::DeviceContext(format!(
                "PrintWindow failed: {}",
                windows::core::Error::from_win32()
            )));
        }
        Ok(())
    }

    fn copy_from_screen(&mut self) -> CaptureResult<()> {
        unsafe {
            BitBlt(
                self.memory_dc.0,
                0,
                0,
                self.bounds.width as i32,
                self.bounds.height as i32,
                self.window_dc.hdc,
                self.bounds.x,
                self.bounds.y,
                SRCCOPY,
            )
        }
        .map_err(|e| CaptureError::DeviceContext(format!("BitBlt failed: {}", e)))
    }

    fn deselect(&mut self) {
        // GetDIBits needs the bitmap out of every DC
        self.selection = None;
    }

    fn read_bgra(&self) -> CaptureResult<Vec<u8>> {
        let desktop = WindowDc::acquire(unsafe { GetDesktopWindow() })
            .map_err(|e| CaptureError::Conversion(format!("desktop DC unavailable: {}", e)))?;

        let width = self.bounds.width;
        let height = self.bounds.height;

        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width as i32,
                biHeight: -(height as i32), // Top-down DIB
                biPlanes: 1,
                biBitCount: DIB_BITS_PER_PIXEL,
                biCompression: BI_RGB.0,
                biSizeImage: 0,
                biXPelsPerMeter: 0,
                biYPelsPerMeter: 0,
                biClrUsed: 0,
                biClrImportant: 0,
            },
            bmiColors: [Default::default()],
        };

        let mut data = vec![0u8; dib_buffer_len(width, height)];

        let lines = unsafe {
            GetDIBits(
                desktop.hdc,
                self.bitmap.0,
                0,
                height,
                Some(data.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        };
        if lines == 0 {
            return Err(CaptureError::Conversion(format!(
                "GetDIBits failed: {}",
                windows::core::Error::from_win32()
            )));
        }

        Ok(data)
    }
}

// ── Backend ────────────────────────────────────────────────────────────────────

/// `PrintWindow` / `BitBlt` / `GetDIBits` capture
#[derive(Debug, Clone, Copy, Default)]
pub struct GdiBackend;

impl CaptureBackend for GdiBackend {
    type Surface = GdiSurface;

    fn window_bounds(&self, handle: WindowHandle) -> CaptureResult<Rect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd_from_handle(handle), &mut rect) }.map_err(|e| {
            CaptureError::HandleInvalid {
                handle,
                reason: format!("GetWindowRect failed: {}", e),
            }
        })?;

        Rect::from_edges(rect.left, rect.top, rect.right, rect.bottom).ok_or_else(|| {
            CaptureError::HandleInvalid {
                handle,
                reason: "window has empty bounds".into(),
            }
        })
    }

    fn open_surface(&self, handle: WindowHandle, bounds: Rect) -> CaptureResult<GdiSurface> {
        let hwnd = hwnd_from_handle(handle);
        let window_dc = WindowDc::acquire(hwnd)?;
        let memory_dc = MemoryDc::compatible_with(&window_dc)?;
        let bitmap = CompatibleBitmap::create(&window_dc, bounds)?;
        let selection = Selection::select(&memory_dc, &bitmap);

        Ok(GdiSurface {
            selection: Some(selection),
            bitmap,
            memory_dc,
            window_dc,
            hwnd,
            bounds,
        })
    }
}
