//! Nibble OCR Library
//!
//! Replaces the text layer of a PDF with fresh OCR output. The main
//! driver binary is in main.rs.
//!
//! # Modules
//!
//! - `strip`: rasterize input pages, discarding any existing text layer
//! - `ocr`: recognize text on page images through an [`ocr::OcrEngine`]
//! - `compose`: write page images plus an invisible, aligned text layer
//! - `pipeline`: run the three stages with progress and cancellation
//! - `mupdf`: low-level MuPDF helpers (rendering, text layer readback)

pub mod compose;
pub mod config;
pub mod error;
pub mod mupdf;
pub mod ocr;
pub mod page;
pub mod pipeline;
pub mod progress;
pub mod strip;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunReport};
pub use progress::{NoProgress, ProgressEvent, ProgressSink};
