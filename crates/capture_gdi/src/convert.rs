//! DIB pixel layout and BGRA → RGBA conversion

use crate::{CaptureError, CaptureResult, PixelImage};
use image::ImageBuffer;

/// Bits per pixel requested from `GetDIBits`
pub const DIB_BITS_PER_PIXEL: u16 = 32;

/// Bytes per pixel in both the DIB and the output image
pub const BYTES_PER_PIXEL: usize = 4;

/// Size of a top-down 32bpp DIB buffer for the given dimensions
pub fn dib_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Convert raw 32bpp BGRA rows (top-down) to an RGBA image.
///
/// Every pixel is visited once in scan order; alpha is carried over untouched.
pub fn bgra_to_rgba(width: u32, height: u32, mut bgra: Vec<u8>) -> CaptureResult<PixelImage> {
    if width == 0 || height == 0 {
        return Err(CaptureError::Conversion(format!(
            "empty bitmap {}x{}",
            width, height
        )));
    }

    let expected = dib_buffer_len(width, height);
    if bgra.len() != expected {
        return Err(CaptureError::Conversion(format!(
            "pixel buffer is {} bytes, expected {} for {}x{}",
            bgra.len(),
            expected,
            width,
            height
        )));
    }

    for pixel in bgra.chunks_exact_mut(BYTES_PER_PIXEL) {
        pixel.swap(0, 2);
    }

    ImageBuffer::from_raw(width, height, bgra)
        .ok_or_else(|| CaptureError::Conversion("image buffer rejected pixel data".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_red_and_blue_and_keeps_alpha() {
        let bgra: Vec<u8> = (0..3 * 2 * 4).map(|i| i as u8).collect();
        let image = bgra_to_rgba(3, 2, bgra.clone()).unwrap();
        let out = image.as_raw();

        assert_eq!(out.len(), 3 * 2 * 4);
        for i in 0..6 {
            assert_eq!(out[4 * i], bgra[4 * i + 2]);
            assert_eq!(out[4 * i + 1], bgra[4 * i + 1]);
            assert_eq!(out[4 * i + 2], bgra[4 * i]);
            assert_eq!(out[4 * i + 3], bgra[4 * i + 3]);
        }
    }

    #[test]
    fn keeps_top_down_row_order() {
        // Row 0 blue, row 1 red (BGRA)
        let bgra = vec![
            255, 0, 0, 255, 255, 0, 0, 255, //
            0, 0, 255, 128, 0, 0, 255, 128,
        ];
        let image = bgra_to_rgba(2, 2, bgra).unwrap();

        assert_eq!(image.get_pixel(1, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [255, 0, 0, 128]);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let err = bgra_to_rgba(4, 4, vec![0; 10]).unwrap_err();
        assert!(matches!(err, CaptureError::Conversion(_)));
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(bgra_to_rgba(0, 5, Vec::new()).is_err());
    }
}
