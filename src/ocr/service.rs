//! Page Recognizer
//!
//! Drives an [`OcrEngine`] over rasterized pages and normalizes what it
//! reports into [`PageResult`]s.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::page::{PageImage, PageResult, RecognizedToken};
use crate::progress::{ProgressEvent, ProgressSink};

use super::provider::OcrEngine;
use super::types::{EngineSpan, OcrError, TimeoutPolicy};

/// Recognizer configuration
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Language passed to the engine (`eng`, `eng+deu`)
    pub language: String,
    /// Maximum engine calls in flight
    pub jobs: usize,
    /// Time budget for a single page
    pub page_timeout: Duration,
    /// What a page timeout does to the run
    pub timeout_policy: TimeoutPolicy,
    /// Pages handed to the engine per call (1 = one page at a time)
    pub batch_size: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            jobs: 1,
            page_timeout: Duration::from_secs(120),
            timeout_policy: TimeoutPolicy::Abort,
            batch_size: 1,
        }
    }
}

/// Recognizes pages with a shared OCR engine
#[derive(Clone)]
pub struct Recognizer {
    engine: Arc<dyn OcrEngine>,
    config: RecognizerConfig,
}

impl Recognizer {
    pub fn new(engine: Arc<dyn OcrEngine>, config: RecognizerConfig) -> Self {
        Self { engine, config }
    }

    /// Make sure the engine can be invoked at all
    pub async fn probe(&self) -> Result<()> {
        self.engine
            .probe(&self.config.language)
            .await
            .map_err(|e| Error::EngineUnavailable(e.to_string()))
    }

    /// Recognize a single page
    ///
    /// A timeout is always returned as [`Error::EngineTimeout`] here,
    /// whatever the configured policy: a caller looping page by page decides
    /// for itself whether to continue.
    pub async fn recognize_one(&self, image: &PageImage) -> Result<PageResult> {
        self.run_page(image, TimeoutPolicy::Abort, &CancellationToken::new())
            .await
    }

    /// Recognize every page, returning results in page order
    ///
    /// The engine is probed first; an unavailable engine fails the whole
    /// call before any page is attempted. Pages run concurrently up to
    /// `jobs` unless the engine forbids concurrent calls. `progress` sees one
    /// event per finished page, in completion order.
    pub async fn recognize(
        &self,
        images: &[PageImage],
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Vec<PageResult>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        self.probe().await?;

        let total = images.len();
        let concurrency = if self.engine.supports_concurrent_calls() {
            self.config.jobs.max(1)
        } else {
            1
        };
        let batch_size = self.config.batch_size.max(1);

        tracing::info!(
            engine = self.engine.name(),
            pages = total,
            concurrency,
            batch_size,
            language = %self.config.language,
            "Recognizing pages"
        );
        let start = Instant::now();

        let policy = self.config.timeout_policy;
        let mut chunks = stream::iter(images.chunks(batch_size))
            .map(|chunk| self.run_chunk(chunk, policy, cancel))
            .buffer_unordered(concurrency);

        let mut results = Vec::with_capacity(total);
        while let Some(chunk_results) = chunks.next().await {
            // Returning early drops the in-flight calls with the stream
            for result in chunk_results? {
                progress.report(ProgressEvent::PageRecognized {
                    page: result.page_index,
                    completed: results.len() + 1,
                    total,
                });
                results.push(result);
            }
        }

        results.sort_by_key(|r| r.page_index);

        tracing::info!(
            pages = results.len(),
            tokens = results.iter().map(|r| r.tokens.len()).sum::<usize>(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recognition finished"
        );
        Ok(results)
    }

    async fn run_chunk(
        &self,
        chunk: &[PageImage],
        policy: TimeoutPolicy,
        cancel: &CancellationToken,
    ) -> Result<Vec<PageResult>> {
        if let [image] = chunk {
            return Ok(vec![self.run_page(image, policy, cancel).await?]);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let budget = self.config.page_timeout * chunk.len() as u32;
        let call = self
            .engine
            .recognize_batch(chunk, self.config.language.as_str());
        let outcomes = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = tokio::time::timeout(budget, call) => outcome,
        };

        // A batch is all or nothing; find the slow page with per-page budgets
        let Ok(outcomes) = outcomes else {
            tracing::warn!(
                first_page = ?chunk.first().map(|i| i.page_index()),
                pages = chunk.len(),
                "OCR batch timed out; retrying page by page"
            );
            let mut results = Vec::with_capacity(chunk.len());
            for image in chunk {
                results.push(self.run_page(image, policy, cancel).await?);
            }
            return Ok(results);
        };

        if outcomes.len() != chunk.len() {
            return Err(Error::Recognition {
                page: chunk.first().map(|i| i.page_index()).unwrap_or_default(),
                reason: format!(
                    "engine returned {} results for {} pages",
                    outcomes.len(),
                    chunk.len()
                ),
            });
        }

        chunk
            .iter()
            .zip(outcomes)
            .map(|(image, outcome)| self.settle(image, outcome, policy))
            .collect()
    }

    /// One engine call for one page, bounded by `page_timeout`
    async fn run_page(
        &self,
        image: &PageImage,
        policy: TimeoutPolicy,
        cancel: &CancellationToken,
    ) -> Result<PageResult> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let call = self
            .engine
            .recognize(image, self.config.language.as_str());
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = tokio::time::timeout(self.config.page_timeout, call) => outcome,
        };

        match outcome {
            Ok(outcome) => self.settle(image, outcome, policy),
            Err(_) => self.timed_out(image, policy),
        }
    }

    fn settle(
        &self,
        image: &PageImage,
        outcome: std::result::Result<Vec<EngineSpan>, OcrError>,
        policy: TimeoutPolicy,
    ) -> Result<PageResult> {
        match outcome {
            Ok(spans) => Ok(PageResult::recognized(
                image.page_index(),
                normalize(image, spans),
            )),
            Err(OcrError::Timeout) => self.timed_out(image, policy),
            Err(e @ (OcrError::Unavailable(_) | OcrError::InvalidLanguage(_))) => {
                Err(Error::EngineUnavailable(e.to_string()))
            }
            Err(OcrError::Processing(reason)) => Err(Error::Recognition {
                page: image.page_index(),
                reason,
            }),
        }
    }

    fn timed_out(&self, image: &PageImage, policy: TimeoutPolicy) -> Result<PageResult> {
        let page = image.page_index();
        let secs = self.config.page_timeout.as_secs();
        match policy {
            TimeoutPolicy::Abort => Err(Error::EngineTimeout { page, secs }),
            TimeoutPolicy::EmptyPage => {
                tracing::warn!(page, secs, "OCR timed out; page left without text");
                Ok(PageResult::timed_out(page))
            }
        }
    }
}

/// Turn raw engine spans into tokens that satisfy the page invariants
///
/// Boxes are clamped to the image; a box with nothing left inside the image
/// is dropped. Reading order is the engine's emission order.
fn normalize(image: &PageImage, spans: Vec<EngineSpan>) -> Vec<RecognizedToken> {
    let (width, height) = (image.width(), image.height());
    let mut tokens = Vec::with_capacity(spans.len());

    for span in spans {
        let text = span.text.trim();
        if text.is_empty() {
            continue;
        }

        let Some(bbox) = span.bbox.clamp_to(width, height) else {
            tracing::warn!(
                page = image.page_index(),
                text,
                bbox = ?span.bbox,
                "Dropped token with box outside the page"
            );
            continue;
        };
        if bbox != span.bbox {
            tracing::debug!(page = image.page_index(), text, "Clamped token box to page");
        }

        let confidence = if span.confidence.is_finite() {
            span.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        tokens.push(RecognizedToken {
            text: text.to_string(),
            bbox,
            confidence,
            reading_order: tokens.len(),
        });
    }

    tokens
}
