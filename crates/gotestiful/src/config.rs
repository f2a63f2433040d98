// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Command line configuration
//!
//! Every run option can come from three places, in increasing precedence:
//! built-in defaults, the `.gotestiful` settings file, and command line flags.
//! Boolean flags are optional so that an absent flag leaves the file value in
//! place, while `--flag` alone means `true` and `--flag=false` turns it off.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::settings::Settings;

/// Default package pattern
pub const DEFAULT_SEARCH_PATH: &str = "./...";

/// gotestiful - readable `go test` output with coverage totals
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gotestiful")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run (defaults to running the tests)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Package pattern to test, as understood by `go list`
    ///
    /// Defaults to `./...`.
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Colourise output
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub color: Option<bool>,

    /// Allow cached test results (`false` runs `go test -count=1`)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub cache: Option<bool>,

    /// Report per-package coverage (`go test -cover`)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub cover: Option<bool>,

    /// Open the HTML coverage report when done (`go tool cover -html`)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub report: Option<bool>,

    /// Coverage profile output file
    ///
    /// A temporary file is used when a profile is needed and none is given.
    /// Writing a profile disables test caching.
    #[arg(long, value_name = "PATH")]
    pub cover_profile: Option<PathBuf>,

    /// Show the output of every test, not just failing ones (`go test -v`)
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub verbose: Option<bool>,

    /// List excluded packages at the end
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub list_ignored: Option<bool>,

    /// Hide packages without tests (they then do not count towards coverage)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub skip_empty: Option<bool>,

    /// List packages without tests at the end
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub list_empty: Option<bool>,

    /// Count packages without tests towards an exact overall coverage
    ///
    /// Adds a placeholder test file to each such package for the duration of
    /// the run. Disables test caching.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true, value_name = "BOOL")]
    pub full_coverage: Option<bool>,

    /// Write the raw `go test -json` output to this file
    #[arg(long, value_name = "PATH")]
    pub test_output: Option<PathBuf>,

    /// Pull request thread URL to post a result comment to
    #[arg(long, env = "GOTESTIFUL_WEBHOOK_URL", value_name = "URL")]
    pub webhook_url: Option<String>,

    /// Bearer token for the webhook
    #[arg(long, env = "GOTESTIFUL_WEBHOOK_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub webhook_token: Option<String>,

    /// Enable diagnostic logging (debug level) on stderr
    #[arg(long, default_value = "false")]
    pub debug: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a `.gotestiful` settings file with default values in the
    /// current directory
    Init,
}

/// Options of one run, after merging settings file and flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Package pattern passed to `go list`
    pub search_path: String,
    pub color: bool,
    pub cache: bool,
    pub cover: bool,
    pub report: bool,
    pub cover_profile: Option<PathBuf>,
    pub verbose: bool,
    pub list_ignored: bool,
    pub skip_empty: bool,
    pub list_empty: bool,
    pub full_coverage: bool,
    pub test_output: Option<PathBuf>,
    /// Exclusion patterns (settings file only)
    pub exclude: Vec<String>,
    /// Webhook URL, empty when no comment should be posted
    pub webhook_url: String,
    pub webhook_token: String,
}

impl Config {
    /// The package pattern, defaulting to `./...`
    #[must_use]
    pub fn search_path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_SEARCH_PATH)
    }

    /// Overlay the flags given on the command line onto `settings`
    #[must_use]
    pub fn merge(&self, settings: &Settings) -> RunConfig {
        let non_empty = |s: &str| (!s.is_empty()).then(|| PathBuf::from(s));

        RunConfig {
            search_path: self.search_path().to_string(),
            color: self.color.unwrap_or(settings.color),
            cache: self.cache.unwrap_or(settings.cache),
            cover: self.cover.unwrap_or(settings.cover),
            report: self.report.unwrap_or(settings.report),
            cover_profile: self
                .cover_profile
                .clone()
                .or_else(|| non_empty(&settings.cover_profile)),
            verbose: self.verbose.unwrap_or(settings.verbose),
            list_ignored: self.list_ignored.unwrap_or(settings.list_ignored),
            skip_empty: self.skip_empty.unwrap_or(settings.skip_empty),
            list_empty: self.list_empty.unwrap_or(settings.list_empty),
            full_coverage: self.full_coverage.unwrap_or(settings.full_coverage),
            test_output: self
                .test_output
                .clone()
                .or_else(|| non_empty(&settings.test_output)),
            exclude: settings.exclude.clone(),
            webhook_url: self.webhook_url.clone().unwrap_or_default(),
            webhook_token: self.webhook_token.clone().unwrap_or_default(),
        }
    }

    /// Get the log level based on the debug flag
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}
