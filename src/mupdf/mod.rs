//! Low-level MuPDF Wrapper
//!
//! Thin helpers over the MuPDF bindings used by the pipeline:
//!
//! - `raster`: open PDF bytes and render pages to RGB buffers
//! - `stext`: read a document's text layer back with page-space boxes
//!
//! # Thread Safety
//!
//! MuPDF's `fz_context` is **NOT thread-safe**. Documents are opened per
//! call and never shared between threads; callers run these functions on a
//! blocking thread (`tokio::task::spawn_blocking`).

mod raster;
mod stext;

pub use raster::{looks_like_pdf, open_pdf, render_page_rgb};
pub use stext::{read_text_layer, PageTextLayer, TextSpan};
