//! Text layer readback
//!
//! Reads the text layer of a PDF through MuPDF's structured text API,
//! word by word, with page-space boxes. Invisible text is included, which
//! is what makes this useful for checking a rebuilt OCR layer.

use mupdf::TextPageOptions;
use serde::Serialize;

use super::raster::open_pdf;

/// One whitespace-delimited run of text on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSpan {
    pub text: String,
    /// Left edge in points, from the left of the page
    pub x: f32,
    /// Top edge in points, from the top of the page
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Text layer of a single page
#[derive(Debug, Clone, Serialize)]
pub struct PageTextLayer {
    pub page_index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    pub spans: Vec<TextSpan>,
}

impl PageTextLayer {
    /// All span text joined with spaces
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Accumulates characters of one word and their bounds
#[derive(Default)]
struct SpanBuilder {
    text: String,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl SpanBuilder {
    fn push(&mut self, c: char, x0: f32, y0: f32, x1: f32, y1: f32) {
        if self.text.is_empty() {
            (self.x0, self.y0, self.x1, self.y1) = (x0, y0, x1, y1);
        } else {
            self.x0 = self.x0.min(x0);
            self.y0 = self.y0.min(y0);
            self.x1 = self.x1.max(x1);
            self.y1 = self.y1.max(y1);
        }
        self.text.push(c);
    }

    fn finish(&mut self, spans: &mut Vec<TextSpan>) {
        if self.text.is_empty() {
            return;
        }
        let builder = std::mem::take(self);
        spans.push(TextSpan {
            text: builder.text,
            x: builder.x0,
            y: builder.y0,
            width: builder.x1 - builder.x0,
            height: builder.y1 - builder.y0,
        });
    }
}

/// Read the text layer of every page of a PDF
pub fn read_text_layer(data: &[u8]) -> Result<Vec<PageTextLayer>, mupdf::Error> {
    let doc = open_pdf(data)?;
    let page_count = doc.page_count()? as usize;
    let mut layers = Vec::with_capacity(page_count);

    for page_index in 0..page_count {
        let page = doc.load_page(page_index as i32)?;
        let bounds = page.bounds()?;
        let text_page = page.to_text_page(TextPageOptions::empty())?;

        let mut spans = Vec::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let mut word = SpanBuilder::default();

                for ch in line.chars() {
                    let Some(c) = ch.char() else { continue };
                    if c.is_whitespace() {
                        word.finish(&mut spans);
                        continue;
                    }

                    let quad = ch.quad();
                    let x0 = quad.ul.x.min(quad.ll.x);
                    let y0 = quad.ul.y.min(quad.ur.y);
                    let x1 = quad.ur.x.max(quad.lr.x);
                    let y1 = quad.ll.y.max(quad.lr.y);
                    word.push(c, x0, y0, x1, y1);
                }

                word.finish(&mut spans);
            }
        }

        layers.push(PageTextLayer {
            page_index,
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
            spans,
        });
    }

    Ok(layers)
}
