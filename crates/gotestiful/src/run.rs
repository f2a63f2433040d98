// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! One complete test run
//!
//! The run is a two-task pipeline: `go test -json` is read in the calling
//! task while a spawned consumer task formats events as they arrive. The
//! consumer's join handle is the barrier after which results are used.

use std::path::{Path, PathBuf};

use anyhow::Context;
use gotestiful_events::{ProcessOptions, Reporter, RunResult, TestEvent, process};
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::notifier::Notifier;
use crate::packages::{self, Placeholders};
use crate::runner::{JsonDecoder, RunnerError, run_command, run_streaming};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// `go test` reported failures; the report has already been printed
#[derive(Debug, Error)]
#[error("tests failed")]
pub struct TestsFailed;

/// Resolve packages, run their tests and print the report
///
/// # Errors
///
/// Returns [`TestsFailed`] when `go test` exits unsuccessfully, and any other
/// error for problems that prevented a complete run.
pub async fn run_tests(config: &RunConfig) -> anyhow::Result<RunResult> {
    let resolution = packages::resolve(&config.search_path, &config.exclude)
        .await
        .context("failed to resolve packages")?;

    let placeholders = if config.full_coverage {
        println!();
        println!(
            "Generating empty tests for full coverage in '{}'",
            config.search_path
        );
        packages::create_placeholders(&resolution.packages, &resolution.included)
            .await
            .context("failed to create placeholder tests")?
    } else {
        Placeholders::default()
    };

    let (cover_profile, _profile_guard) =
        prepare_cover_profile(config).context("failed to create coverage profile")?;

    let mut sink = open_sink(config.test_output.as_deref()).await?;

    let options = ProcessOptions {
        packages: resolution.included.clone(),
        excluded: resolution.excluded.clone().unwrap_or_default(),
        placeholder_packages: placeholders.packages().clone(),
        verbose: config.verbose,
        skip_empty: config.skip_empty,
        list_empty: config.list_empty,
        list_excluded: config.list_ignored,
        indent: 2,
        cover_profile: cover_profile.clone(),
        reporter: Reporter::new(config.color),
    };
    let (tx, rx) = mpsc::channel::<TestEvent>(EVENT_CHANNEL_CAPACITY);
    let consumer = tokio::spawn(process(rx, options, |line: &str| println!("{line}")));

    println!();
    println!(
        "Testing {} packages in '{}'",
        resolution.included.len(),
        config.search_path
    );
    println!();

    let produced = if resolution.included.is_empty() {
        debug!("no packages selected, skipping go test");
        drop(tx);
        Ok(())
    } else {
        let args = go_test_args(config, cover_profile.as_deref(), &resolution.included);
        run_streaming("go", &args, b"", JsonDecoder::new(), tx, &mut sink).await
    };

    let result = consumer.await.context("event processor task failed")?;

    let notifier = Notifier::new(&config.webhook_url, &config.webhook_token);
    if let Err(e) = notifier
        .send(result.coverage.percentage, &result.failed_tests)
        .await
    {
        warn!(error = %e, "failed to post result comment");
    }

    match produced {
        Ok(()) => {}
        Err(RunnerError::ExitStatus { status, .. }) => {
            debug!(%status, "go test reported failures");
            return Err(TestsFailed.into());
        }
        Err(e) => return Err(e).context("failed to run go test"),
    }

    if config.report
        && let Some(profile) = &cover_profile
    {
        let args = vec![
            "tool".to_string(),
            "cover".to_string(),
            format!("-html={}", profile.display()),
        ];
        run_command("go", &args, b"")
            .await
            .context("failed to open coverage report")?;
    }

    drop(placeholders);
    Ok(result)
}

/// Arguments of the `go test` invocation
#[must_use]
pub fn go_test_args(
    config: &RunConfig,
    cover_profile: Option<&Path>,
    packages: &[String],
) -> Vec<String> {
    let mut args = vec!["test".to_string()];
    if config.verbose {
        args.push("-v".to_string());
    }
    if !config.cache {
        args.push("-count=1".to_string());
    }
    if config.cover {
        args.push("-cover".to_string());
    }
    if let Some(profile) = cover_profile {
        args.push(format!("-coverprofile={}", profile.display()));
    }
    args.push("-json".to_string());
    args.extend(packages.iter().cloned());
    args
}

/// Coverage profile path for the run, if one is needed
///
/// A profile is written when the HTML report or full coverage is requested.
/// Without a configured path a temporary `coverage-*.out` file is used; it is
/// removed when the returned guard drops.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created.
pub fn prepare_cover_profile(
    config: &RunConfig,
) -> std::io::Result<(Option<PathBuf>, Option<NamedTempFile>)> {
    if !(config.report || config.full_coverage) {
        return Ok((None, None));
    }
    if let Some(path) = &config.cover_profile {
        return Ok((Some(path.clone()), None));
    }

    let file = tempfile::Builder::new()
        .prefix("coverage-")
        .suffix(".out")
        .tempfile()?;
    Ok((Some(file.path().to_path_buf()), Some(file)))
}

/// Destination of the raw `go test -json` output
async fn open_sink(path: Option<&Path>) -> anyhow::Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to open test output file {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::sink())),
    }
}
