// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Streaming `go test -json` event processing
//!
//! [`EventProcessor`] consumes the flat, interleaved event stream of a test run
//! and reconstructs per-test and per-package outcomes from it:
//!
//! - test output is buffered per test and only printed when the test fails
//!   (or always, in verbose mode), together with its `--- FAIL` marker
//! - each package gets one aligned status line with its coverage and elapsed
//!   time
//! - the stream end produces a package summary and the overall coverage
//!
//! Lines are handed to an injected callback as soon as they are known, so the
//! report appears progressively while `go test` is still running.
//!
//! # Example
//!
//! ```
//! use gotestiful_events::{Action, EventProcessor, ProcessOptions, TestEvent};
//!
//! let mut lines = Vec::new();
//! let result = {
//!     let options = ProcessOptions::new(vec!["tst".to_string()]);
//!     let mut processor = EventProcessor::new(options, |line: &str| lines.push(line.to_string()));
//!     processor.handle(TestEvent::new(Action::Pass, "tst").with_elapsed(0.266));
//!     processor.finish()
//! };
//!
//! assert_eq!(lines[0], "✔ tst              0.266s");
//! assert_eq!(result.tested, 1);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::coverage::{TotalCoverage, coverage_parse, total_coverage};
use crate::event::{Action, TestEvent};
use crate::reporter::{Reporter, Tone, coverage_tone};

// ============================================================================
// Output line patterns
// ============================================================================

static PACKAGE_SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(ok  \t|FAIL\t)").expect("valid regex"));
static PASS_FAIL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(PASS|FAIL)$").expect("valid regex"));
static RUN_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^=== (RUN|CONT|PAUSE|NAME)").expect("valid regex"));
static NO_TEST_FILES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\?\s+(.+)\s+\[no test files\]$").expect("valid regex"));
static COVERAGE_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^coverage: ").expect("valid regex"));
static COVERAGE_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^coverage: (\d{1,3}(?:\.\d{1,2})?%) of statements").expect("valid regex")
});
static COVERAGE_NO_STATEMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^coverage: \[no statements\]$").expect("valid regex"));
static TEST_SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*--- (PASS|FAIL|SKIP): ").expect("valid regex"));
static TEST_SKIP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*--- SKIP: ").expect("valid regex"));

const CHEVRON: &str = "❯";
const FULL_COVERAGE_HINT: &str = "(set flag '--full-coverage' for accurate calculation)";

/// Framework lines that carry no information for the report
fn is_noise(line: &str) -> bool {
    PACKAGE_SUMMARY.is_match(line)
        || PASS_FAIL_LINE.is_match(line)
        || RUN_LINE.is_match(line)
        || NO_TEST_FILES.is_match(line)
}

/// What a package's `coverage: ...` line said
#[derive(Debug, Clone, PartialEq)]
enum PackageCoverage {
    /// `coverage: [no statements]`
    NoStatements,
    /// `coverage: 12.5% of statements`
    Percent(String),
    /// No (recognisable) coverage line
    Missing,
}

impl PackageCoverage {
    fn classify(line: Option<&str>) -> Self {
        let Some(line) = line else {
            return Self::Missing;
        };
        if COVERAGE_NO_STATEMENTS.is_match(line) {
            return Self::NoStatements;
        }
        COVERAGE_PERCENT
            .captures(line)
            .and_then(|c| c.get(1))
            .map_or(Self::Missing, |m| Self::Percent(m.as_str().to_string()))
    }
}

// ============================================================================
// Options and results
// ============================================================================

/// Settings that shape the report of one run
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Import paths selected for testing, in listing order
    pub packages: Vec<String>,
    /// Import paths removed by exclusion patterns
    pub excluded: Vec<String>,
    /// Packages that only pass because a placeholder test file was added
    pub placeholder_packages: HashSet<String>,
    /// Print every test's output, not just failing ones
    pub verbose: bool,
    /// Omit the status line of packages without tests
    pub skip_empty: bool,
    /// List packages without tests after the summary
    pub list_empty: bool,
    /// List excluded packages after the summary
    pub list_excluded: bool,
    /// Spaces used for each level of test output indentation
    pub indent: usize,
    /// Coverage profile used for the exact total, if one was written
    pub cover_profile: Option<PathBuf>,
    /// Colour settings
    pub reporter: Reporter,
}

impl ProcessOptions {
    /// Default options for the given package list, without colours
    #[must_use]
    pub fn new(packages: Vec<String>) -> Self {
        Self {
            packages,
            excluded: Vec::new(),
            placeholder_packages: HashSet::new(),
            verbose: false,
            skip_empty: false,
            list_empty: false,
            list_excluded: false,
            indent: 2,
            cover_profile: None,
            reporter: Reporter::plain(),
        }
    }
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Number of packages selected for testing
    pub tested: usize,
    /// Packages whose terminal event was `fail`, in arrival order
    pub failed_packages: Vec<String>,
    /// Packages without test files, in arrival order
    pub no_test_packages: Vec<String>,
    /// Packages removed by exclusion patterns
    pub excluded_packages: Vec<String>,
    /// Overall coverage
    pub coverage: TotalCoverage,
    /// Distinct names of failed tests, sorted
    pub failed_tests: Vec<String>,
}

impl RunResult {
    /// Check that no package and no test failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_packages.is_empty() && self.failed_tests.is_empty()
    }
}

// ============================================================================
// Processor
// ============================================================================

/// `(package, test)` identifying one test
type TestKey = (String, String);

/// Incremental processor of a `go test -json` stream
pub struct EventProcessor<F>
where
    F: FnMut(&str),
{
    options: ProcessOptions,
    line_out: F,
    indent: String,
    max_package_len: usize,
    /// Output lines held back until the test's outcome is known
    pending_output: HashMap<TestKey, Vec<String>>,
    failed_tests: HashSet<TestKey>,
    /// Last `coverage: ...` line per package, consumed by its terminal event
    coverage_lines: HashMap<String, String>,
    failed_packages: Vec<String>,
    no_test_packages: Vec<String>,
    samples: Vec<f64>,
}

impl<F> EventProcessor<F>
where
    F: FnMut(&str),
{
    /// Create a processor writing formatted lines to `line_out`
    pub fn new(options: ProcessOptions, line_out: F) -> Self {
        let max_package_len = options.packages.iter().map(String::len).max().unwrap_or(0);
        let indent = " ".repeat(options.indent);
        Self {
            options,
            line_out,
            indent,
            max_package_len,
            pending_output: HashMap::new(),
            failed_tests: HashSet::new(),
            coverage_lines: HashMap::new(),
            failed_packages: Vec::new(),
            no_test_packages: Vec::new(),
            samples: Vec::new(),
        }
    }

    /// Process one event
    pub fn handle(&mut self, event: TestEvent) {
        let package_level = event.is_package_level();
        match event.action {
            Action::Output => {
                if let Some(output) = event.output.as_deref() {
                    self.handle_output(&event, output);
                }
            }
            Action::Skip if package_level => self.handle_no_tests(&event.package),
            Action::Pass
                if package_level
                    && self.options.placeholder_packages.contains(&event.package) =>
            {
                self.handle_no_tests(&event.package);
            }
            Action::Pass | Action::Fail if package_level => self.handle_package_result(&event),
            _ => {}
        }
    }

    /// Print the summary and return the aggregate result
    pub fn finish(mut self) -> RunResult {
        let reporter = self.options.reporter;
        (self.line_out)("");

        let chevron = reporter.paint(Tone::Muted, CHEVRON);
        let packages = format!(
            "tested: {}{}{}{}",
            self.options.packages.len(),
            reporter.paint(
                Tone::Alert,
                &format!("    failed: {}", self.failed_packages.len())
            ),
            reporter.paint(
                Tone::Caution,
                &format!("    noTests: {}", self.no_test_packages.len())
            ),
            reporter.paint(
                Tone::Muted,
                &format!("    excluded: {}", self.options.excluded.len())
            ),
        );
        (self.line_out)(&format!("{chevron} Pkgs: {packages}"));

        let coverage = total_coverage(self.options.cover_profile.as_deref(), &self.samples);
        let formatted = reporter.paint_bold(
            coverage_tone(coverage.percentage),
            &format!("{:.2}%", coverage.percentage),
        );
        let note = if coverage.is_exact {
            "   [accurate]".to_string()
        } else {
            format!(
                "   [average]    {}",
                reporter.paint(Tone::Muted, FULL_COVERAGE_HINT)
            )
        };
        (self.line_out)(&format!("{chevron} Coverage: {formatted}{note}"));

        if self.options.list_empty {
            (self.line_out)("");
            (self.line_out)(&reporter.paint_bold(Tone::Caution, "Packages with no tests:"));
            for package in &self.no_test_packages {
                (self.line_out)(&format!("- {package}"));
            }
        }

        if self.options.list_excluded {
            (self.line_out)("");
            (self.line_out)(&reporter.paint_bold(Tone::Caution, "Packages ignored:"));
            for package in &self.options.excluded {
                (self.line_out)(&format!("- {package}"));
            }
        }

        let failed_tests: BTreeSet<String> =
            self.failed_tests.into_iter().map(|(_, test)| test).collect();

        RunResult {
            tested: self.options.packages.len(),
            failed_packages: self.failed_packages,
            no_test_packages: self.no_test_packages,
            excluded_packages: self.options.excluded,
            coverage,
            failed_tests: failed_tests.into_iter().collect(),
        }
    }

    fn handle_output(&mut self, event: &TestEvent, output: &str) {
        let raw = output.trim_end_matches(['\n', '\r']);
        if is_noise(raw) {
            return;
        }

        if COVERAGE_ANY.is_match(raw) {
            self.coverage_lines
                .insert(event.package.clone(), raw.to_string());
            return;
        }

        let line = raw.trim_end().replace("    ", &self.indent);
        let key = (event.package.clone(), event.test.clone());

        if TEST_SUMMARY.is_match(&line) {
            self.handle_test_summary(key, &line);
        } else if !line.is_empty() {
            if event.is_package_level() {
                trace!(package = %event.package, line = %line, "dropping package output");
                return;
            }
            let line = self
                .options
                .reporter
                .paint(Tone::Neutral, &line.replace('\t', &self.indent));

            if self.failed_tests.contains(&key) {
                self.emit(&line);
            } else {
                self.pending_output.entry(key).or_default().push(line);
            }
        }
    }

    /// A `--- PASS/FAIL/SKIP: <name>` line marks the end of a test
    fn handle_test_summary(&mut self, key: TestKey, line: &str) {
        let reporter = self.options.reporter;

        if line.contains("--- FAIL") && !key.1.is_empty() {
            self.failed_tests.insert(key.clone());
        }

        let mut line = line
            .replacen("(0.00s)", "", 1)
            .replacen("--- PASS: ", &reporter.paint(Tone::Neutral, "✔ "), 1)
            .replacen("--- FAIL: ", &reporter.paint(Tone::Alert, "✖ "), 1);
        if TEST_SKIP.is_match(&line) {
            line = format!(
                "{}    {}",
                line.replacen("--- SKIP: ", &reporter.paint(Tone::Muted, "≋ "), 1),
                reporter.paint(Tone::Muted, "skipped")
            );
        }

        let pending = self.pending_output.remove(&key).unwrap_or_default();
        if self.options.verbose || self.failed_tests.contains(&key) {
            self.emit(&line);
            for pending_line in &pending {
                self.emit(pending_line);
            }
        }
    }

    fn handle_no_tests(&mut self, package: &str) {
        self.coverage_lines.remove(package);
        self.no_test_packages.push(package.to_string());

        if self.options.skip_empty {
            return;
        }
        self.samples.push(0.0);

        let reporter = self.options.reporter;
        let line = format!(
            "{} {}{}   {}     {}",
            reporter.paint_bold(Tone::Caution, "!"),
            package,
            self.padding(package),
            reporter.paint(Tone::Muted, &format!("{:>6}", "0.0%")),
            reporter.paint(Tone::Caution, "no tests"),
        );
        self.emit(&line);
    }

    /// The package-level `pass`/`fail` event closes a package
    fn handle_package_result(&mut self, event: &TestEvent) {
        let reporter = self.options.reporter;
        let package = event.package.as_str();

        let glyph = if event.action == Action::Pass {
            reporter.paint(Tone::Good, "✔ ")
        } else {
            self.failed_packages.push(package.to_string());
            reporter.paint(Tone::Alert, "◼ ")
        };

        let mut line = format!(
            "{glyph}{}{}",
            reporter.paint_bold(Tone::Plain, package),
            self.padding(package)
        );

        let coverage_line = self.coverage_lines.remove(package);
        match PackageCoverage::classify(coverage_line.as_deref()) {
            PackageCoverage::NoStatements => {
                line.push_str("   ");
                line.push_str(&reporter.paint(
                    Tone::Muted,
                    &format!("{:>6}     no statements", "-"),
                ));
            }
            coverage => {
                let column = match coverage {
                    PackageCoverage::Percent(percent) => {
                        let value = coverage_parse(&percent);
                        self.samples.push(value);
                        reporter.paint(coverage_tone(value), &format!("{percent:>6}"))
                    }
                    _ => format!("{:>6}", ""),
                };
                line.push_str("   ");
                line.push_str(&column);
                line.push_str("     ");

                // elapsed == 0 is the only hint of a cached result in the stream
                let elapsed = event.elapsed_secs();
                if elapsed == 0.0 {
                    line.push_str(&reporter.paint(Tone::Muted, "cached"));
                } else {
                    line.push_str(&format!("{elapsed:.3}s"));
                }
            }
        }

        if self.options.verbose {
            line.push('\n');
            line.push_str(
                &reporter.paint(Tone::Muted, &"-".repeat(self.max_package_len + 22)),
            );
        }

        self.emit(&line);
    }

    fn padding(&self, package: &str) -> String {
        " ".repeat(self.max_package_len.saturating_sub(package.len()))
    }

    /// Emit each line of `block`, right-trimmed, skipping empty ones
    fn emit(&mut self, block: &str) {
        for line in block.split('\n') {
            let line = line.trim_end();
            if !line.is_empty() {
                (self.line_out)(line);
            }
        }
    }
}

/// Drain `events` through a processor until the sender side closes
///
/// This is the consumer half of a run: it returns only after every event sent
/// before the channel closed has been handled.
pub async fn process<F>(
    mut events: mpsc::Receiver<TestEvent>,
    options: ProcessOptions,
    line_out: F,
) -> RunResult
where
    F: FnMut(&str),
{
    let mut processor = EventProcessor::new(options, line_out);
    while let Some(event) = events.recv().await {
        processor.handle(event);
    }
    processor.finish()
}
