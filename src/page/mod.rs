//! Page Module
//!
//! Rasterized pages and their recognized tokens, the entities shared by
//! every pipeline stage.

mod types;

pub use types::{PageImage, PageResult, PageStatus, PixelBox, RecognizedToken};
