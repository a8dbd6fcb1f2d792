//! OCR Types
//!
//! Types shared by OCR engines and the recognizer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::page::PixelBox;

/// Raw text span reported by an engine, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSpan {
    pub text: String,
    /// Box in pixel space of the recognized image; may be out of range
    pub bbox: PixelBox,
    /// Confidence scaled to 0.0-1.0 by the engine
    pub confidence: f32,
}

/// Unit of text the engine should report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenGranularity {
    #[default]
    Word,
    Line,
}

impl FromStr for TokenGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "word" | "words" => Ok(Self::Word),
            "line" | "lines" => Ok(Self::Line),
            other => Err(format!("Unknown token granularity: {}", other)),
        }
    }
}

impl fmt::Display for TokenGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word => f.write_str("word"),
            Self::Line => f.write_str("line"),
        }
    }
}

/// What to do when a page exceeds its recognition time budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Fail the run with `EngineTimeout`
    #[default]
    Abort,
    /// Keep going; the page gets an empty result marked as timed out
    EmptyPage,
}

impl FromStr for TimeoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "empty" | "empty_page" | "empty-page" => Ok(Self::EmptyPage),
            other => Err(format!("Unknown timeout policy: {}", other)),
        }
    }
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::EmptyPage => f.write_str("empty"),
        }
    }
}

/// OCR engine error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    Unavailable(String),

    #[error("OCR engine timed out")]
    Timeout,

    #[error("OCR processing failed: {0}")]
    Processing(String),

    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),
}

/// Validate a Tesseract-style language code (`eng`, `eng+deu`, `chi_sim`)
///
/// Language codes end up on a command line, so anything outside
/// alphanumerics, `_` and `+` is refused.
pub fn validate_language(lang: &str) -> Result<(), OcrError> {
    if lang.is_empty() || lang.len() > 20 {
        return Err(OcrError::InvalidLanguage(format!(
            "length must be 1-20 characters, got {}",
            lang.len()
        )));
    }
    if let Some(c) = lang
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '+' && *c != '_')
    {
        return Err(OcrError::InvalidLanguage(format!(
            "invalid character {:?} in {:?}",
            c, lang
        )));
    }
    Ok(())
}
