//! Export module for WindowShot
//!
//! Names capture files and writes them as PNG.

mod naming;
mod png;

pub use naming::{sequence_file_name, SequenceCounter, FILE_PREFIX, TIMESTAMP_FORMAT};
pub use png::{count_png_files, ImageSink, PngSink};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type ExportResult<T> = Result<T, ExportError>;
