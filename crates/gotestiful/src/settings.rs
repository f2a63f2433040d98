// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Per-project settings file
//!
//! A `.gotestiful` JSON file in the working directory supplies defaults for
//! every run option. The file is optional; missing keys keep their built-in
//! defaults and unknown keys are ignored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Name of the settings file looked up in the working directory
pub const SETTINGS_FILE: &str = ".gotestiful";

/// Options persisted in `.gotestiful`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Colourise output
    pub color: bool,
    /// Allow `go test` result caching
    pub cache: bool,
    /// Collect per-package coverage
    pub cover: bool,
    /// Open the HTML coverage report afterwards
    pub report: bool,
    /// Coverage profile path, empty for a temporary file
    pub cover_profile: String,
    /// Show output of passing tests too
    pub verbose: bool,
    /// List excluded packages at the end
    pub list_ignored: bool,
    /// Hide packages without tests
    pub skip_empty: bool,
    /// List packages without tests at the end
    pub list_empty: bool,
    /// Add placeholder tests so untested packages count towards coverage
    pub full_coverage: bool,
    /// File receiving the raw `go test -json` output, empty for none
    pub test_output: String,
    /// Import path prefixes (regular expressions) to exclude
    pub exclude: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            cache: true,
            cover: true,
            report: false,
            cover_profile: String::new(),
            verbose: false,
            list_ignored: false,
            skip_empty: true,
            list_empty: false,
            full_coverage: false,
            test_output: String::new(),
            exclude: Vec::new(),
        }
    }
}

impl Settings {
    /// Path of the settings file in `dir`
    #[must_use]
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(SETTINGS_FILE)
    }

    /// Load settings from `path`, or the defaults when the file does not exist
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Read` if the file exists but cannot be read,
    /// or `SettingsError::Parse` if it is not valid JSON.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the default settings to `path`
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::AlreadyExists` if a file is already present,
    /// or `SettingsError::Write` if it cannot be written.
    pub fn init(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            return Err(SettingsError::AlreadyExists(path.to_path_buf()));
        }

        let settings = Self::default();
        let json =
            serde_json::to_string_pretty(&settings).map_err(|e| SettingsError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?;
        std::fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(settings)
    }
}

/// Settings file errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        /// Settings file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The settings file is not valid JSON
    #[error("Failed to parse settings file {path}: {source}")]
    Parse {
        /// Settings file path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// `init` found an existing settings file
    #[error("Settings file already exists at {0}")]
    AlreadyExists(PathBuf),

    /// The settings file could not be written
    #[error("Failed to write settings file {path}: {source}")]
    Write {
        /// Settings file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}
