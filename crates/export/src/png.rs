//! PNG encode-and-write sink

use crate::{ExportError, ExportResult};
use image::{ImageFormat, RgbaImage};
use std::fs;
use std::path::Path;

/// Destination for finished captures
pub trait ImageSink: Send + Sync {
    fn write(&self, image: &RgbaImage, path: &Path) -> ExportResult<()>;
}

/// Writes each capture as a PNG file
#[derive(Debug, Clone, Copy, Default)]
pub struct PngSink;

impl ImageSink for PngSink {
    fn write(&self, image: &RgbaImage, path: &Path) -> ExportResult<()> {
        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|source| ExportError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::trace!(path = %path.display(), "png written");
        Ok(())
    }
}

/// Number of `.png` files directly inside `dir`
pub fn count_png_files(dir: &Path) -> ExportResult<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().extension().map_or(false, |e| e == "png") {
            count += 1;
        }
    }
    Ok(count)
}
