//! Window enumeration for the selection list

use crate::{CaptureResult, WindowHandle, WindowInfo};

/// Titles of shell and system windows that are never offered for capture
pub const DEFAULT_EXCLUDED_TITLES: &[&str] = &["Program Manager", "Default IME"];

/// One top-level window as reported by the OS, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWindow {
    pub handle: WindowHandle,
    pub visible: bool,
    pub title: String,
}

/// Enumerates top-level windows in OS order
pub trait WindowSource {
    fn top_level_windows(&self) -> CaptureResult<Vec<RawWindow>>;
}

/// Deny list of exact window titles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleFilter {
    excluded: Vec<String>,
}

impl TitleFilter {
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, title: &str) -> bool {
        !title.is_empty() && !self.excluded.iter().any(|t| t == title)
    }
}

impl Default for TitleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_TITLES.iter().copied())
    }
}

/// Lists windows a user can pick as capture target
pub struct WindowCatalog<S> {
    source: S,
    filter: TitleFilter,
}

impl<S: WindowSource> WindowCatalog<S> {
    pub fn new(source: S) -> Self {
        Self::with_filter(source, TitleFilter::default())
    }

    pub fn with_filter(source: S, filter: TitleFilter) -> Self {
        Self { source, filter }
    }

    /// Visible, titled, non-system windows in enumeration order.
    ///
    /// Duplicate titles are kept; the handle tells them apart.
    pub fn list_visible_windows(&self) -> CaptureResult<Vec<WindowInfo>> {
        let windows = self
            .source
            .top_level_windows()?
            .into_iter()
            .filter(|w| w.visible && self.filter.allows(&w.title))
            .map(|w| WindowInfo {
                handle: w.handle,
                title: w.title,
            })
            .collect();

        Ok(windows)
    }

    /// Look up a window by handle among the currently listed ones
    pub fn find(&self, handle: WindowHandle) -> CaptureResult<Option<WindowInfo>> {
        Ok(self
            .list_visible_windows()?
            .into_iter()
            .find(|w| w.handle == handle))
    }
}
