//! Pipeline error types
//!
//! Every failure a pipeline stage can raise, kept as distinct variants so the
//! driver can tell the user exactly what went wrong.

use std::path::PathBuf;

use thiserror::Error;

/// Unified pipeline error type
#[derive(Debug, Error)]
pub enum Error {
    /// Source PDF is missing, unreadable, or not a PDF container
    #[error("Invalid input PDF: {0}")]
    Input(String),

    /// A page could not be rasterized (fatal for the whole run)
    #[error("Failed to render page {page}: {reason}")]
    PageRender { page: usize, reason: String },

    /// OCR engine cannot be invoked (missing binary, missing language data)
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A single page exceeded its recognition time budget
    #[error("OCR timed out on page {page} after {secs} seconds")]
    EngineTimeout { page: usize, secs: u64 },

    /// The engine ran but reported a failure for this page
    #[error("OCR failed on page {page}: {reason}")]
    Recognition { page: usize, reason: String },

    /// Page images and recognition results do not line up
    #[error("Shape mismatch: {images} page images vs {results} page results ({detail})")]
    ShapeMismatch {
        images: usize,
        results: usize,
        detail: String,
    },

    /// Output could not be written; nothing was left at the destination
    #[error("Failed to write output {}: {reason}", path.display())]
    OutputWrite { path: PathBuf, reason: String },

    /// The run was cancelled at a page boundary
    #[error("Pipeline run cancelled")]
    Cancelled,
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the driver may choose to continue past this error.
    ///
    /// Only a per-page timeout qualifies; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EngineTimeout { .. })
    }

    /// Whether this error indicates a programming defect rather than bad input
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }

    pub(crate) fn output_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OutputWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::EngineTimeout { page: 3, secs: 120 };
        assert_eq!(err.to_string(), "OCR timed out on page 3 after 120 seconds");

        let err = Error::output_write("/nope/out.pdf", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to write output /nope/out.pdf: No such file or directory"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::EngineTimeout { page: 0, secs: 1 }.is_recoverable());
        assert!(!Error::EngineUnavailable("missing".into()).is_recoverable());
        assert!(!Error::Cancelled.is_recoverable());

        let mismatch = Error::ShapeMismatch {
            images: 2,
            results: 1,
            detail: "length".into(),
        };
        assert!(mismatch.is_defect());
        assert!(!Error::Input("bad".into()).is_defect());
    }
}
