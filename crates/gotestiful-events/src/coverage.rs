// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Overall coverage computation
//!
//! Two modes are supported:
//! - **exact**: statement-weighted, computed from a `-coverprofile` file
//! - **average**: arithmetic mean of the per-package percentages printed by
//!   `go test -cover`
//!
//! The exact mode needs the profile, which in turn disables the test cache, so
//! the average is what a default run reports. [`TotalCoverage::is_exact`]
//! always tells the two apart.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Overall coverage of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotalCoverage {
    /// Coverage percentage (0-100)
    pub percentage: f64,
    /// `true` when computed from a coverage profile, `false` when averaged
    pub is_exact: bool,
}

impl TotalCoverage {
    /// An averaged result
    #[must_use]
    pub fn average(samples: &[f64]) -> Self {
        Self {
            percentage: average(samples),
            is_exact: false,
        }
    }
}

/// Compute the overall coverage
///
/// Uses the profile at `profile` when it is a readable file with at least one
/// statement, otherwise falls back to averaging `samples`.
#[must_use]
pub fn total_coverage(profile: Option<&Path>, samples: &[f64]) -> TotalCoverage {
    let Some(path) = profile.filter(|p| p.is_file()) else {
        return TotalCoverage::average(samples);
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cover profile");
            return TotalCoverage::average(samples);
        }
    };

    let mut totals = ProfileTotals::default();
    for line in BufReader::new(file).lines() {
        match line {
            Ok(line) => totals.add_line(&line),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read cover profile");
                return TotalCoverage::average(samples);
            }
        }
    }

    match totals.percentage() {
        Some(percentage) => TotalCoverage {
            percentage,
            is_exact: true,
        },
        None => {
            debug!(path = %path.display(), "cover profile has no statements");
            TotalCoverage::average(samples)
        }
    }
}

/// Running statement counts of a coverage profile
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProfileTotals {
    /// Statements seen
    pub statements: f64,
    /// Statements in blocks that were hit
    pub covered: f64,
}

impl ProfileTotals {
    /// Accumulate one profile line
    ///
    /// Lines are `<file:range> <statements> <hits>` with unsigned counts.
    /// Anything else, including the `mode:` header, is ignored.
    pub fn add_line(&mut self, line: &str) {
        let parts: Vec<&str> = line.split(' ').collect();
        let [_, statements, hits] = parts.as_slice() else {
            return;
        };
        let (Ok(statements), Ok(hits)) = (statements.parse::<u64>(), hits.parse::<u64>()) else {
            return;
        };
        let statements = statements as f64;
        self.statements += statements;
        // any hit counts, not only `1`, so `count` and `atomic` profiles work too
        if hits > 0 {
            self.covered += statements;
        }
    }

    /// Covered percentage, `None` when no statements were seen
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        if self.statements > 0.0 {
            Some(self.covered / self.statements * 100.0)
        } else {
            None
        }
    }
}

/// Parse a percentage such as `" 12.30% "`; unparsable input yields 0
#[must_use]
pub fn coverage_parse(coverage: &str) -> f64 {
    coverage
        .trim_matches(|c| matches!(c, '%' | ' ' | '\t' | '\n'))
        .parse()
        .unwrap_or(0.0)
}

/// Arithmetic mean, 0 for an empty list
#[must_use]
pub fn average(samples: &[f64]) -> f64 {
    let total: f64 = samples.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    total / samples.len() as f64
}
