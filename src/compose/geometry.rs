//! Pixel space to page space
//!
//! Everything that converts image coordinates into PDF coordinates lives
//! here. The image and every token go through the same `72 / dpi` scale.

use crate::page::PixelBox;

use super::font::{ASCENT, DESCENT, GLYPH_ADVANCE};

/// Points per inch
const POINTS_PER_INCH: f32 = 72.0;

/// Rectangle in PDF page space (points, origin bottom-left, y-up)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Where and how large to draw one token's text run
///
/// The run spans `bbox` in both directions: from descender to ascender
/// vertically, and from the first glyph's origin to the last glyph's
/// advance horizontally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// The token's box on the page
    pub bbox: PageBox,
    /// Baseline height; sits `DESCENT` em above the bottom of `bbox`
    pub baseline: f32,
    /// Font size making ascender to descender exactly `bbox.height`
    pub font_size: f32,
    /// Horizontal stretch making `glyphs` glyphs exactly `bbox.width` wide
    pub horizontal_scale: f32,
}

/// Page size in points for an image of `width`×`height` pixels at `dpi`
pub fn page_size(width: u32, height: u32, dpi: f32) -> (f32, f32) {
    (to_points(width as f32, dpi), to_points(height as f32, dpi))
}

/// Multiply before dividing so whole-inch sizes come out exact
fn to_points(pixels: f32, dpi: f32) -> f32 {
    pixels * POINTS_PER_INCH / dpi
}

/// Project a token box from image pixels onto the page
///
/// `page_height` is the page height in points and is needed to flip the
/// y axis. `glyphs` is the number of glyphs that will be drawn for the
/// token.
pub fn project_token(bbox: &PixelBox, dpi: f32, page_height: f32, glyphs: usize) -> Placement {
    let width = to_points(bbox.width, dpi);
    let height = to_points(bbox.height, dpi);
    let x = to_points(bbox.left, dpi);
    let y = page_height - to_points(bbox.bottom(), dpi);

    let font_size = height / (ASCENT + DESCENT);
    let natural_width = GLYPH_ADVANCE * glyphs.max(1) as f32 * font_size;
    let horizontal_scale = if natural_width > 0.0 {
        width / natural_width
    } else {
        1.0
    };

    Placement {
        bbox: PageBox {
            x,
            y,
            width,
            height,
        },
        baseline: y + DESCENT * font_size,
        font_size,
        horizontal_scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    /// Page-space extents of the drawn run: (left, bottom, right, top)
    fn run_extents(placement: &Placement, glyphs: usize) -> (f32, f32, f32, f32) {
        let size = placement.font_size;
        let left = placement.bbox.x;
        let right = left + GLYPH_ADVANCE * glyphs as f32 * size * placement.horizontal_scale;
        (
            left,
            placement.baseline - DESCENT * size,
            right,
            placement.baseline + ASCENT * size,
        )
    }

    #[test]
    fn test_page_size_at_common_dpis() {
        let (w, h) = page_size(2550, 3300, 300.0);
        assert!(close(w, 612.0) && close(h, 792.0));

        let (w, h) = page_size(612, 792, 72.0);
        assert!(close(w, 612.0) && close(h, 792.0));
    }

    #[test]
    fn test_project_flips_y() {
        // 1 inch square, 1 inch from the top-left corner, on a 300 dpi letter page
        let bbox = PixelBox::new(300.0, 300.0, 300.0, 300.0);
        let placement = project_token(&bbox, 300.0, 792.0, 1);

        assert!(close(placement.bbox.x, 72.0));
        assert!(close(placement.bbox.y, 792.0 - 144.0));
        assert!(close(placement.bbox.width, 72.0));
        assert!(close(placement.bbox.height, 72.0));
    }

    #[test]
    fn test_run_fills_box_whatever_its_aspect() {
        let boxes = [
            // Very wide: "WORD" stretched over 200pt at 12pt tall
            (PixelBox::new(50.0, 280.0, 200.0, 12.0), 4),
            // Very narrow: a long word squeezed into 30pt at 40pt tall
            (PixelBox::new(300.0, 100.0, 30.0, 40.0), 12),
            // Square single glyph
            (PixelBox::new(0.0, 0.0, 20.0, 20.0), 1),
        ];

        for (bbox, glyphs) in boxes {
            let placement = project_token(&bbox, 72.0, 792.0, glyphs);
            let (left, bottom, right, top) = run_extents(&placement, glyphs);

            assert!(close(left, bbox.left), "left {} for {:?}", left, bbox);
            assert!(close(right, bbox.left + bbox.width), "right {} for {:?}", right, bbox);
            assert!(close(top, 792.0 - bbox.top), "top {} for {:?}", top, bbox);
            assert!(
                close(bottom, 792.0 - bbox.bottom()),
                "bottom {} for {:?}",
                bottom,
                bbox
            );
        }
    }

    #[test]
    fn test_font_size_follows_box_height() {
        let short = project_token(&PixelBox::new(0.0, 0.0, 300.0, 10.0), 72.0, 792.0, 3);
        let tall = project_token(&PixelBox::new(0.0, 0.0, 30.0, 40.0), 72.0, 792.0, 3);

        assert!(close(short.font_size, 10.0 / (ASCENT + DESCENT)));
        assert!(close(tall.font_size, 40.0 / (ASCENT + DESCENT)));
        assert!(short.horizontal_scale > 1.0);
        assert!(tall.horizontal_scale < 1.0);
    }

    #[test]
    fn test_zero_glyphs_does_not_divide_by_zero() {
        let bbox = PixelBox::new(0.0, 0.0, 60.0, 30.0);
        let placement = project_token(&bbox, 72.0, 100.0, 0);
        assert!(placement.font_size.is_finite());
        assert!(placement.horizontal_scale.is_finite());
    }
}
