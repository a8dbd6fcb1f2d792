//! Page types
//!
//! The data that flows between the stripper, the recognizer and the
//! compositor: rasterized pages and the tokens recognized on them.

use std::sync::Arc;

use image::RgbImage;
use serde::Serialize;

/// A single rasterized page
///
/// Cloning is cheap: the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct PageImage {
    pixels: Arc<RgbImage>,
    dpi: f32,
    page_index: usize,
}

impl PageImage {
    pub fn new(pixels: RgbImage, dpi: f32, page_index: usize) -> Self {
        Self {
            pixels: Arc::new(pixels),
            dpi,
            page_index,
        }
    }

    /// Pixel buffer (8-bit RGB, row-major, origin top-left)
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Resolution the page was rendered at
    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    /// 0-based position of the page in the source document
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Page size in PDF points, as the source page would have rendered
    pub fn size_in_points(&self) -> (f32, f32) {
        crate::compose::page_size(self.width(), self.height(), self.dpi)
    }
}

/// Rectangle in the pixel space of a [`PageImage`] (origin top-left, y-down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &PixelBox) -> PixelBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        PixelBox::new(left, top, right - left, bottom - top)
    }

    /// Intersect with `[0,width]×[0,height]`.
    ///
    /// Returns `None` when nothing with positive area remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<PixelBox> {
        let finite = [self.left, self.top, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return None;
        }

        let (w, h) = (width as f32, height as f32);
        let left = self.left.clamp(0.0, w);
        let top = self.top.clamp(0.0, h);
        let right = self.right().clamp(0.0, w);
        let bottom = self.bottom().clamp(0.0, h);

        if right - left <= 0.0 || bottom - top <= 0.0 {
            return None;
        }
        Some(PixelBox::new(left, top, right - left, bottom - top))
    }

    pub fn is_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0.0
            && self.top >= 0.0
            && self.right() <= width as f32
            && self.bottom() <= height as f32
    }
}

/// One unit of recognized text (word or line, depending on granularity)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedToken {
    pub text: String,
    pub bbox: PixelBox,
    /// Recognition confidence, 0.0 to 1.0
    pub confidence: f32,
    /// Position in the engine's emission order on this page
    pub reading_order: usize,
}

/// How a page's recognition ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// The engine finished; zero tokens means the page has no text
    Recognized,
    /// The engine ran out of time; the page is empty but NOT confirmed blank
    TimedOut,
}

/// Ordered recognition output for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub page_index: usize,
    pub status: PageStatus,
    pub tokens: Vec<RecognizedToken>,
}

impl PageResult {
    pub fn recognized(page_index: usize, tokens: Vec<RecognizedToken>) -> Self {
        Self {
            page_index,
            status: PageStatus::Recognized,
            tokens,
        }
    }

    pub fn timed_out(page_index: usize) -> Self {
        Self {
            page_index,
            status: PageStatus::TimedOut,
            tokens: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Space-joined text of all tokens in reading order
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
