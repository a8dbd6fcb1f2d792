//! Page rasterization
//!
//! Opens PDF bytes with MuPDF and renders pages to 8-bit RGB buffers.
//! Only painted content ends up in the raster: invisible text (render
//! mode 3) is never drawn, and annotations/form widgets are skipped.

use image::RgbImage;
use mupdf::{Colorspace, Document, Matrix, Page};

const PDF_MIME: &str = "application/pdf";

/// How far into the file the `%PDF-` header may appear
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Check for a PDF header near the start of the data
pub fn looks_like_pdf(data: &[u8]) -> bool {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Open a PDF document from bytes
pub fn open_pdf(data: &[u8]) -> Result<Document, mupdf::Error> {
    Document::from_bytes(data, PDF_MIME)
}

/// Render a page at the given resolution
///
/// Returns `Ok(None)` if MuPDF produced a pixmap that cannot be read back
/// as RGB.
pub fn render_page_rgb(page: &Page, dpi: f32) -> Result<Option<RgbImage>, mupdf::Error> {
    // 1.0 = 72 DPI
    let scale = dpi / 72.0;
    let matrix = Matrix::new_scale(scale, scale);

    // No alpha (scans are opaque), no annotations or widgets
    let colorspace = Colorspace::device_rgb();
    let pixmap = page.to_pixmap(&matrix, &colorspace, false, false)?;

    Ok(pixmap_to_rgb(&pixmap))
}

fn pixmap_to_rgb(pixmap: &mupdf::Pixmap) -> Option<RgbImage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;
    if n == 0 {
        return None;
    }

    samples_to_rgb(samples, width, height, n)
}

/// Pack interleaved samples with `n` components per pixel into RGB
fn samples_to_rgb(samples: &[u8], width: u32, height: u32, n: usize) -> Option<RgbImage> {
    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);

    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = *samples.get(offset)?;
            // Gray pixmaps carry a single component
            let (g, b) = if n >= 3 {
                (*samples.get(offset + 1)?, *samples.get(offset + 2)?)
            } else {
                (r, r)
            };
            rgb.extend_from_slice(&[r, g, b]);
        }
    }

    RgbImage::from_raw(width, height, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_pdf() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        // Leading junk before the header is tolerated
        assert!(looks_like_pdf(b"\xef\xbb\xbf%PDF-1.4"));
        assert!(!looks_like_pdf(b"PK\x03\x04 not a pdf"));
        assert!(!looks_like_pdf(b""));
    }

    #[test]
    fn test_samples_to_rgb_drops_alpha() {
        // 2x1 RGBA
        let samples = [10, 20, 30, 255, 40, 50, 60, 128];
        let img = samples_to_rgb(&samples, 2, 1, 4).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(img.get_pixel(1, 0).0, [40, 50, 60]);
    }

    #[test]
    fn test_samples_to_rgb_gray() {
        let samples = [0, 200];
        let img = samples_to_rgb(&samples, 1, 2, 1).unwrap();
        assert_eq!(img.get_pixel(0, 1).0, [200, 200, 200]);
    }

    #[test]
    fn test_samples_to_rgb_short_buffer() {
        assert!(samples_to_rgb(&[1, 2, 3], 2, 1, 3).is_none());
    }
}
