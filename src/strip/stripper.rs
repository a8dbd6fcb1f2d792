//! PDF layer stripper
//!
//! Rasterizes every page of the source document. The text layer,
//! annotations and form fields are not carried over: only what MuPDF
//! actually paints survives into the [`PageImage`].

use std::path::Path;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::mupdf;
use crate::page::PageImage;

/// Default render resolution, high enough for reliable OCR
pub const DEFAULT_DPI: f32 = 300.0;

/// Accepted render resolution range
pub const MIN_DPI: f32 = 72.0;
pub const MAX_DPI: f32 = 600.0;

/// Converts a PDF into one raster image per page
#[derive(Debug, Clone)]
pub struct LayerStripper {
    dpi: f32,
}

impl Default for LayerStripper {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

impl LayerStripper {
    /// Create a stripper rendering at `dpi` (clamped to 72..=600)
    pub fn new(dpi: f32) -> Self {
        Self {
            dpi: dpi.clamp(MIN_DPI, MAX_DPI),
        }
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// Strip a PDF file on disk. The file is only read.
    pub fn strip_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PageImage>> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Input(format!("Failed to read {}: {}", path.display(), e)))?;
        self.strip_bytes(&data)
    }

    /// Strip a PDF held in memory
    pub fn strip_bytes(&self, data: &[u8]) -> Result<Vec<PageImage>> {
        self.strip_with_cancel(data, &CancellationToken::new())
    }

    /// Strip a PDF, checking `cancel` before each page
    ///
    /// Any page that fails to render fails the whole call; no partial
    /// result is returned.
    pub fn strip_with_cancel(
        &self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<PageImage>> {
        if !mupdf::looks_like_pdf(data) {
            return Err(Error::Input("Missing %PDF header".to_string()));
        }

        let doc = mupdf::open_pdf(data)
            .map_err(|e| Error::Input(format!("Failed to open PDF: {}", e)))?;
        let page_count = doc
            .page_count()
            .map_err(|e| Error::Input(format!("Failed to read page tree: {}", e)))?
            .max(0) as usize;

        tracing::debug!(pages = page_count, dpi = self.dpi, "Stripping PDF");
        let start = Instant::now();

        let mut images = Vec::with_capacity(page_count);
        for page_index in 0..page_count {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let render_error = |reason: String| Error::PageRender {
                page: page_index,
                reason,
            };

            let page = doc
                .load_page(page_index as i32)
                .map_err(|e| render_error(e.to_string()))?;
            let pixels = mupdf::render_page_rgb(&page, self.dpi)
                .map_err(|e| render_error(e.to_string()))?
                .ok_or_else(|| render_error("Unreadable pixmap".to_string()))?;

            if pixels.width() == 0 || pixels.height() == 0 {
                return Err(render_error("Page rendered to an empty image".to_string()));
            }

            tracing::trace!(
                page = page_index,
                width = pixels.width(),
                height = pixels.height(),
                "Rendered page"
            );
            images.push(PageImage::new(pixels, self.dpi, page_index));
        }

        tracing::info!(
            pages = images.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stripped text layer"
        );
        Ok(images)
    }
}
