//! `go test -json` and `go list -json` record types
//!
//! Both tools emit PascalCase JSON objects. `go test -json` writes one event
//! per line; `go list -json` writes one pretty-printed object per package.
//!
//! # Example
//!
//! ```
//! use gotestiful_events::event::{Action, TestEvent};
//!
//! let event = TestEvent::parse(
//!     r#"{"Time":"2024-01-02T10:00:00.5Z","Action":"fail","Package":"pkg/a","Test":"TestX","Elapsed":0.01}"#,
//! ).unwrap();
//! assert_eq!(event.action, Action::Fail);
//! assert_eq!(event.test_name(), Some("TestX"));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EventsError;

// ============================================================================
// Test Events (from `go test -json`)
// ============================================================================

/// The `Action` field of a test event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// The test has started running
    Run,
    /// The test or package passed
    Pass,
    /// The test or package failed
    Fail,
    /// The test was skipped, or the package has no test files
    Skip,
    /// The event carries one line of test output
    Output,
    /// A paused parallel test continues
    Cont,
    /// A parallel test is paused
    Pause,
    /// Any action this tool does not interpret (`start`, `bench`, ...)
    #[serde(other)]
    Other,
}

/// One record of the `go test -json` stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestEvent {
    /// When the event was emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    /// What happened
    pub action: Action,
    /// Import path of the package the event belongs to
    #[serde(default)]
    pub package: String,
    /// Test name, empty for package-level events
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test: String,
    /// Elapsed seconds; 0 for instant results and for cached packages alike
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    /// Raw output line including its trailing newline (`output` events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TestEvent {
    /// Build a bare event for `package`
    #[must_use]
    pub fn new(action: Action, package: impl Into<String>) -> Self {
        Self {
            time: None,
            action,
            package: package.into(),
            test: String::new(),
            elapsed: None,
            output: None,
        }
    }

    /// Attach a test name
    #[must_use]
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = test.into();
        self
    }

    /// Attach an elapsed time in seconds
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: f64) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Attach an output line
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Parse a single JSON event
    ///
    /// # Errors
    ///
    /// Returns `EventsError::JsonParse` if the JSON is invalid.
    pub fn parse(json: &str) -> Result<Self, EventsError> {
        serde_json::from_str(json).map_err(EventsError::from)
    }

    /// The test name, or `None` for package-level events
    #[must_use]
    pub fn test_name(&self) -> Option<&str> {
        if self.test.is_empty() {
            None
        } else {
            Some(&self.test)
        }
    }

    /// Whether this event describes the package rather than one of its tests
    #[must_use]
    pub fn is_package_level(&self) -> bool {
        self.test.is_empty()
    }

    /// Elapsed seconds, 0 when absent
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.unwrap_or(0.0)
    }
}

/// Parse a recorded `go test -json` dump (one event per line)
///
/// Blank lines are skipped.
///
/// # Errors
///
/// Returns `EventsError::JsonParse` if any line is invalid JSON.
pub fn parse_events(output: &str) -> Result<Vec<TestEvent>, EventsError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(TestEvent::parse)
        .collect()
}

// ============================================================================
// Packages (from `go list -json`)
// ============================================================================

/// A package as described by `go list -json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    /// Directory containing the package sources
    #[serde(default)]
    pub dir: String,
    /// Full import path, which is also the `Package` field of test events
    #[serde(default)]
    pub import_path: String,
    /// Package clause name
    #[serde(default)]
    pub name: String,
}
