//! Persisted driver preferences
//!
//! A small JSON file next to where the tool is run, holding the last used
//! output folder.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SETTINGS_FILE: &str = "nibble-settings.json";
const DEFAULT_OUTPUT_FOLDER: &str = "output_pdfs/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,
}

fn default_output_folder() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FOLDER)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
        }
    }
}

impl Settings {
    /// Load settings; a missing or unreadable file gives the defaults
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    /// Remember `folder` as the output folder. Writes only on change.
    pub fn remember_output_folder(&mut self, folder: &Path, path: &Path) -> anyhow::Result<bool> {
        if self.output_folder == folder {
            return Ok(false);
        }
        self.output_folder = folder.to_path_buf();
        self.save(path)?;
        Ok(true)
    }
}
