//! Layer Stripper
//!
//! Turns an input PDF into an ordered sequence of [`crate::page::PageImage`],
//! discarding any embedded text or previous OCR layer on the way.

mod stripper;

pub use stripper::{LayerStripper, DEFAULT_DPI, MAX_DPI, MIN_DPI};
