// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! gotestiful: readable `go test` output with coverage totals
//!
//! Runs `go test -json` for the selected packages, prints one aligned line per
//! package plus the output of failing tests, and finishes with a summary and
//! the overall coverage.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::error;

use gotestiful::config::{Command, Config};
use gotestiful::run::{TestsFailed, run_tests};
use gotestiful::settings::Settings;

/// Tests ran and some failed
const EXIT_TESTS_FAILED: u8 = 1;
/// The run could not be completed
const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Logs go to stderr so they never mix with the report on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(config.log_level().into())
                .from_env_lossy(),
        )
        .init();

    match dispatch(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<TestsFailed>().is_some() => ExitCode::from(EXIT_TESTS_FAILED),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn dispatch(config: &Config) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let settings_path = Settings::path_in(&cwd);

    match config.command {
        Some(Command::Init) => {
            Settings::init(&settings_path)?;
            println!("Created {}", settings_path.display());
            Ok(())
        }
        None => {
            let settings = Settings::load(&settings_path)?;
            let run_config = config.merge(&settings);
            run_tests(&run_config).await.map(|_| ())
        }
    }
}
