//! Configuration management for nibble-ocr

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::ocr::{
    validate_language, Recognizer, RecognizerConfig, TesseractConfig, TesseractEngine,
    TimeoutPolicy, TokenGranularity,
};
use crate::pipeline::Pipeline;
use crate::strip::{LayerStripper, DEFAULT_DPI, MAX_DPI, MIN_DPI};

#[derive(Debug, Clone)]
pub struct Config {
    pub render: RenderConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Rasterization resolution (72..=600)
    pub dpi: f32,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub language: String,
    pub tesseract_path: String,
    pub psm: u8,
    pub jobs: usize,
    pub timeout_secs: u64,
    pub on_timeout: TimeoutPolicy,
    pub granularity: TokenGranularity,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Half the available CPUs, at least one
fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

impl Default for Config {
    fn default() -> Self {
        Config {
            render: RenderConfig { dpi: DEFAULT_DPI },
            ocr: OcrConfig {
                language: "eng".to_string(),
                tesseract_path: "tesseract".to_string(),
                psm: 3,
                jobs: default_jobs(),
                timeout_secs: 120,
                on_timeout: TimeoutPolicy::Abort,
                granularity: TokenGranularity::Word,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let parse = |key: &'static str| -> Option<(&'static str, String)> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        };

        let dpi = match parse("NIBBLE_DPI") {
            Some((key, value)) => parse_value::<f32>(key, &value)?.clamp(MIN_DPI, MAX_DPI),
            None => defaults.render.dpi,
        };

        let language = parse("NIBBLE_OCR_LANG")
            .map(|(_, v)| v)
            .unwrap_or(defaults.ocr.language);
        validate_language(&language).map_err(|e| ConfigError {
            key: "NIBBLE_OCR_LANG",
            value: language.clone(),
            reason: e.to_string(),
        })?;

        let jobs = match parse("NIBBLE_OCR_JOBS") {
            Some((key, value)) => parse_value::<usize>(key, &value)?.max(1),
            None => defaults.ocr.jobs,
        };

        Ok(Config {
            render: RenderConfig { dpi },
            ocr: OcrConfig {
                language,
                tesseract_path: parse("NIBBLE_TESSERACT_PATH")
                    .map(|(_, v)| v)
                    .unwrap_or(defaults.ocr.tesseract_path),
                psm: match parse("NIBBLE_OCR_PSM") {
                    Some((key, value)) => parse_value(key, &value)?,
                    None => defaults.ocr.psm,
                },
                jobs,
                timeout_secs: match parse("NIBBLE_OCR_TIMEOUT_SECS") {
                    Some((key, value)) => parse_value::<u64>(key, &value)?.max(1),
                    None => defaults.ocr.timeout_secs,
                },
                on_timeout: match parse("NIBBLE_OCR_ON_TIMEOUT") {
                    Some((key, value)) => parse_value(key, &value)?,
                    None => defaults.ocr.on_timeout,
                },
                granularity: match parse("NIBBLE_OCR_GRANULARITY") {
                    Some((key, value)) => parse_value(key, &value)?,
                    None => defaults.ocr.granularity,
                },
            },
        })
    }

    pub fn stripper(&self) -> LayerStripper {
        LayerStripper::new(self.render.dpi)
    }

    pub fn tesseract(&self) -> TesseractConfig {
        TesseractConfig {
            binary: self.ocr.tesseract_path.clone(),
            psm: self.ocr.psm,
            granularity: self.ocr.granularity,
            scratch_dir: None,
        }
    }

    pub fn recognizer_config(&self) -> RecognizerConfig {
        RecognizerConfig {
            language: self.ocr.language.clone(),
            jobs: self.ocr.jobs,
            page_timeout: Duration::from_secs(self.ocr.timeout_secs),
            timeout_policy: self.ocr.on_timeout,
            batch_size: 1,
        }
    }

    /// Pipeline backed by the Tesseract executable
    pub fn pipeline(&self) -> Pipeline {
        let engine = Arc::new(TesseractEngine::new(self.tesseract()));
        Pipeline::new(
            self.stripper(),
            Recognizer::new(engine, self.recognizer_config()),
        )
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
