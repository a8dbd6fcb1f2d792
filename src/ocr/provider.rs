//! OCR Engines
//!
//! Defines the engine trait (the boundary to the external OCR capability)
//! and the Tesseract implementation.

use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::page::PageImage;

use super::tsv::parse_tsv;
use super::types::{validate_language, EngineSpan, OcrError, TokenGranularity};

/// OCR engine trait
///
/// One call recognizes one rasterized page. A failure must be reported as
/// an error, never as an empty span list: an empty list means "no text".
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Check that the engine can be invoked for `language`
    async fn probe(&self, language: &str) -> Result<(), OcrError>;

    /// Recognize one page image
    async fn recognize(&self, image: &PageImage, language: &str)
        -> Result<Vec<EngineSpan>, OcrError>;

    /// Recognize several pages in one call, one outcome per image in order.
    ///
    /// The default loops over [`OcrEngine::recognize`]; engines with a real
    /// batch API override it.
    async fn recognize_batch(
        &self,
        images: &[PageImage],
        language: &str,
    ) -> Vec<Result<Vec<EngineSpan>, OcrError>> {
        let mut outcomes = Vec::with_capacity(images.len());
        for image in images {
            outcomes.push(self.recognize(image, language).await);
        }
        outcomes
    }

    /// Whether concurrent calls on one engine instance are allowed.
    ///
    /// When false the recognizer issues one call at a time.
    fn supports_concurrent_calls(&self) -> bool {
        true
    }
}

/// Tesseract configuration
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Path to the tesseract executable (default: "tesseract" - uses PATH)
    pub binary: String,
    /// Page segmentation mode (default: 3, fully automatic)
    pub psm: u8,
    /// Report words or whole lines
    pub granularity: TokenGranularity,
    /// Directory for the per-page PNG handed to tesseract (default: system temp)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            psm: 3,
            granularity: TokenGranularity::Word,
            scratch_dir: None,
        }
    }
}

/// Tesseract OCR engine, driven through its command-line interface
///
/// Each call spawns its own process, so concurrent calls are safe.
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out page drops its future; take the process down with it
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> OcrError {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcrError::Unavailable(format!("{} not found: {}", self.config.binary, e))
        } else {
            OcrError::Processing(format!("Failed to run {}: {}", self.config.binary, e))
        }
    }

    /// Languages installed for this tesseract
    pub async fn installed_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = self
            .command()
            .arg("--list-langs")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(OcrError::Unavailable(format!(
                "{} --list-langs failed: {}",
                self.config.binary,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        // Older versions print the list on stderr
        let listing = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(parse_language_list(&listing))
    }
}

/// Parse `tesseract --list-langs` output
fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn probe(&self, language: &str) -> Result<(), OcrError> {
        validate_language(language)?;

        let status = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?
            .status;
        if !status.success() {
            return Err(OcrError::Unavailable(format!(
                "{} --version exited with {}",
                self.config.binary, status
            )));
        }

        let installed = self.installed_languages().await?;
        for lang in language.split('+') {
            if !installed.iter().any(|l| l == lang) {
                return Err(OcrError::Unavailable(format!(
                    "language data for '{}' is not installed",
                    lang
                )));
            }
        }

        Ok(())
    }

    async fn recognize(
        &self,
        image: &PageImage,
        language: &str,
    ) -> Result<Vec<EngineSpan>, OcrError> {
        validate_language(language)?;

        // PNG encoding is CPU-bound; keep it off the async workers
        let page = image.clone();
        let png = tokio::task::spawn_blocking(move || {
            let mut buffer = Vec::new();
            page.pixels()
                .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)?;
            Ok::<_, image::ImageError>(buffer)
        })
        .await
        .map_err(|e| OcrError::Processing(format!("Encode task failed: {}", e)))?
        .map_err(|e| OcrError::Processing(format!("Failed to encode page image: {}", e)))?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("nibble-ocr-").suffix(".png");
        let input = match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| OcrError::Processing(format!("Failed to create temp file: {}", e)))?;

        tokio::fs::write(input.path(), &png)
            .await
            .map_err(|e| OcrError::Processing(format!("Failed to write temp file: {}", e)))?;

        let output = self
            .command()
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(self.config.psm.to_string())
            .arg("--dpi")
            .arg((image.dpi().round() as u32).to_string())
            .arg("tsv")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(OcrError::Processing(format!(
                "Tesseract failed on page {}: {}",
                image.page_index(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        parse_tsv(&tsv, self.config.granularity)
    }
}

/// Scripted engine for unit tests
#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    pub struct ScriptedEngine {
        /// Spans per page index; pages not listed have no text
        pub spans: HashMap<usize, Vec<EngineSpan>>,
        /// Artificial latency per page index
        pub delays: HashMap<usize, Duration>,
        /// Pages whose call fails
        pub failures: HashMap<usize, String>,
        pub available: bool,
        pub concurrent: bool,
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl ScriptedEngine {
        pub fn new() -> Self {
            Self {
                available: true,
                concurrent: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn probe(&self, _language: &str) -> Result<(), OcrError> {
            if self.available {
                Ok(())
            } else {
                Err(OcrError::Unavailable("scripted engine is offline".into()))
            }
        }

        async fn recognize(
            &self,
            image: &PageImage,
            _language: &str,
        ) -> Result<Vec<EngineSpan>, OcrError> {
            let page = image.page_index();
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delays.get(&page) {
                tokio::time::sleep(*delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(reason) = self.failures.get(&page) {
                return Err(OcrError::Processing(reason.clone()));
            }
            Ok(self.spans.get(&page).cloned().unwrap_or_default())
        }

        fn supports_concurrent_calls(&self) -> bool {
            self.concurrent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_language_list() {
        let listing = "List of available languages in \"/usr/share/tessdata/\" (3):\neng\nosd\ndeu\n";
        assert_eq!(parse_language_list(listing), ["eng", "osd", "deu"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let engine = TesseractEngine::new(TesseractConfig {
            binary: "/nonexistent/bin/tesseract-nibble".to_string(),
            ..Default::default()
        });
        let result = engine.probe("eng").await;
        assert!(matches!(result, Err(OcrError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_bad_language_is_rejected_before_spawning() {
        let engine = TesseractEngine::new(TesseractConfig::default());
        let result = engine.probe("eng --oem 0").await;
        assert!(matches!(result, Err(OcrError::InvalidLanguage(_))));
    }
}
