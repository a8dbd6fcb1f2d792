//! OCR Module
//!
//! Recognizes text on rasterized pages.
//!
//! # Engines
//!
//! - **Tesseract**: the `tesseract` executable, run once per page with TSV
//!   output. Must be installed with the requested language data.
//!
//! Any other engine plugs in through [`OcrEngine`].

mod provider;
mod service;
mod tsv;
mod types;

pub use provider::{OcrEngine, TesseractConfig, TesseractEngine};
pub use service::{Recognizer, RecognizerConfig};
pub use tsv::parse_tsv;
pub use types::{validate_language, EngineSpan, OcrError, TimeoutPolicy, TokenGranularity};
