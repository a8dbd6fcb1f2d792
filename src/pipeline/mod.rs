//! Pipeline
//!
//! Runs the three stages in order: strip the input to page images,
//! recognize every page, compose the searchable output. MuPDF and the PDF
//! writer are blocking, so those stages run on the blocking pool.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::compose::LayerCompositor;
use crate::error::{Error, Result};
use crate::ocr::Recognizer;
use crate::page::PageStatus;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::strip::LayerStripper;

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pages: usize,
    pub tokens: usize,
    /// Pages left without text because OCR ran out of time
    pub timed_out_pages: Vec<usize>,
    /// Hex SHA-256 of the input bytes
    pub input_sha256: String,
    pub output: PathBuf,
    pub elapsed_ms: u64,
}

/// Strip, recognize and compose one document
#[derive(Clone)]
pub struct Pipeline {
    stripper: LayerStripper,
    recognizer: Recognizer,
    compositor: LayerCompositor,
}

impl Pipeline {
    pub fn new(stripper: LayerStripper, recognizer: Recognizer) -> Self {
        Self {
            stripper,
            recognizer,
            compositor: LayerCompositor::new(),
        }
    }

    /// Run on a PDF file. The input file is never written to.
    pub async fn run_path(
        &self,
        input: &Path,
        output: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        if same_file(input, output) {
            return Err(Error::output_write(output, "output would replace the input file"));
        }

        let data = tokio::fs::read(input)
            .await
            .map_err(|e| Error::Input(format!("Failed to read {}: {}", input.display(), e)))?;
        self.run(data, output, progress, cancel).await
    }

    /// Run on PDF bytes, writing the result to `output`
    pub async fn run(
        &self,
        input: Vec<u8>,
        output: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", run_id = %run_id);

        self.run_inner(run_id, input, output, progress, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        input: Vec<u8>,
        output: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let input_sha256 = hex::encode(Sha256::digest(&input));
        tracing::info!(
            bytes = input.len(),
            sha256 = %input_sha256,
            output = %output.display(),
            "Starting run"
        );

        progress.report(ProgressEvent::Stripping);
        let stripper = self.stripper.clone();
        let strip_cancel = cancel.clone();
        let images =
            tokio::task::spawn_blocking(move || stripper.strip_with_cancel(&input, &strip_cancel))
                .await
                .map_err(|e| Error::PageRender {
                    page: 0,
                    reason: format!("Render task failed: {}", e),
                })??;
        progress.report(ProgressEvent::Stripped {
            pages: images.len(),
        });

        let results = self.recognizer.recognize(&images, progress, cancel).await?;

        let pages = images.len();
        let tokens = results.iter().map(|r| r.tokens.len()).sum();
        let timed_out_pages: Vec<usize> = results
            .iter()
            .filter(|r| r.status == PageStatus::TimedOut)
            .map(|r| r.page_index)
            .collect();

        progress.report(ProgressEvent::Composing);
        let compositor = self.compositor.clone();
        let compose_cancel = cancel.clone();
        let destination = output.to_path_buf();
        tokio::task::spawn_blocking(move || {
            compositor.compose_with_cancel(&images, &results, &destination, &compose_cancel)
        })
        .await
        .map_err(|e| Error::output_write(output, format!("Compose task failed: {}", e)))??;
        progress.report(ProgressEvent::Finished);

        let report = RunReport {
            run_id,
            pages,
            tokens,
            timed_out_pages,
            input_sha256,
            output: output.to_path_buf(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if !report.timed_out_pages.is_empty() {
            tracing::warn!(
                pages = ?report.timed_out_pages,
                "Some pages timed out and have no text layer"
            );
        }
        tracing::info!(
            pages = report.pages,
            tokens = report.tokens,
            elapsed_ms = report.elapsed_ms,
            "Run finished"
        );
        Ok(report)
    }
}

/// Whether two paths name the same existing file
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("in.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let dotted = dir.path().join(".").join("in.pdf");
        assert!(same_file(&file, &dotted));
        assert!(!same_file(&file, &dir.path().join("out.pdf")));
    }
}
