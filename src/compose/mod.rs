//! Layer Compositor
//!
//! Reassembles page images and recognized tokens into a searchable PDF.
//!
//! - `geometry`: pixel to point projection and per-token font sizing
//! - `font`: Courier metrics and WinAnsi encoding for the text layer
//! - `writer`: the `lopdf` document builder and atomic file output

mod font;
mod geometry;
mod writer;

pub use font::{encode_win_ansi, GLYPH_ADVANCE};
pub use geometry::{page_size, project_token, PageBox, Placement};
pub use writer::LayerCompositor;
