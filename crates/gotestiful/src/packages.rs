// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Package discovery, exclusion and placeholder test files
//!
//! Packages are listed with `go list -json <path>`. Exclusion patterns are
//! regular expressions anchored at the start of the import path, so a plain
//! import path excludes itself and everything below it.
//!
//! For exact coverage, packages without test files need a test file to be
//! instrumented at all. [`create_placeholders`] adds an empty one per such
//! package; the returned [`Placeholders`] guard removes them again when
//! dropped.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::Path;

use gotestiful_events::{Action, Package, TestEvent};
use regex::Regex;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::runner::{JsonDecoder, RecordDecoder, RunnerError, run_streaming};

const CHANNEL_CAPACITY: usize = 64;

/// Errors from package resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// An exclusion pattern is not a valid regular expression
    #[error("Cannot compile exclude pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern as configured
        pattern: String,
        /// Compilation error
        source: regex::Error,
    },

    /// Running `go` failed
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Creating a placeholder file failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Packages selected for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Selected packages by import path
    pub packages: HashMap<String, Package>,
    /// Selected import paths in listing order
    pub included: Vec<String>,
    /// Excluded import paths in listing order, `None` when nothing matched
    pub excluded: Option<Vec<String>>,
}

/// List the packages matching `search_path` and apply `exclude_patterns`
///
/// # Errors
///
/// Returns `ResolveError::Runner` if `go list` fails or prints something
/// other than package objects, and `ResolveError::InvalidPattern` for a
/// malformed exclusion pattern.
pub async fn resolve(
    search_path: &str,
    exclude_patterns: &[String],
) -> Result<Resolution, ResolveError> {
    let args = vec![
        "list".to_string(),
        "-json".to_string(),
        search_path.to_string(),
    ];
    let listed: Vec<Package> = collect_records(&args, JsonDecoder::new()).await?;
    debug!(count = listed.len(), search_path, "listed packages");

    from_listing(listed, exclude_patterns)
}

/// Build a [`Resolution`] from `go list` output
///
/// # Errors
///
/// Returns `ResolveError::InvalidPattern` for a malformed exclusion pattern.
pub fn from_listing(
    listed: Vec<Package>,
    exclude_patterns: &[String],
) -> Result<Resolution, ResolveError> {
    let all: Vec<String> = listed.iter().map(|p| p.import_path.clone()).collect();
    let (included, excluded) = exclude_packages(&all, exclude_patterns)?;

    let selected: HashSet<&str> = included.iter().map(String::as_str).collect();
    let packages = listed
        .into_iter()
        .filter(|p| selected.contains(p.import_path.as_str()))
        .map(|p| (p.import_path.clone(), p))
        .collect();

    Ok(Resolution {
        packages,
        included,
        excluded,
    })
}

/// Split `packages` into included and excluded import paths
///
/// Each non-empty pattern is compiled as `^<pattern>`; a package matching any
/// of them is excluded. Empty patterns are skipped. Order is preserved.
///
/// # Errors
///
/// Returns `ResolveError::InvalidPattern` naming the first pattern that does
/// not compile.
pub fn exclude_packages(
    packages: &[String],
    patterns: &[String],
) -> Result<(Vec<String>, Option<Vec<String>>), ResolveError> {
    let regexes = patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|pattern| {
            Regex::new(&format!("^{pattern}")).map_err(|source| ResolveError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if regexes.is_empty() {
        return Ok((packages.to_vec(), None));
    }

    let (excluded, included): (Vec<String>, Vec<String>) = packages
        .iter()
        .cloned()
        .partition(|pkg| regexes.iter().any(|re| re.is_match(pkg)));

    let excluded = (!excluded.is_empty()).then_some(excluded);
    Ok((included, excluded))
}

// ============================================================================
// Placeholder test files
// ============================================================================

/// Placeholder test files, deleted when dropped
#[derive(Debug, Default)]
pub struct Placeholders {
    files: Vec<NamedTempFile>,
    packages: HashSet<String>,
}

impl Placeholders {
    /// Import paths that received a placeholder
    #[must_use]
    pub fn packages(&self) -> &HashSet<String> {
        &self.packages
    }

    #[cfg(test)]
    fn paths(&self) -> Vec<std::path::PathBuf> {
        self.files.iter().map(|f| f.path().to_path_buf()).collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.files.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Add a placeholder test file to every selected package without tests
///
/// Packages without test files are found with `go test -list . -json`: they
/// are the ones reported with a package-level `skip`.
///
/// # Errors
///
/// Returns `ResolveError::Runner` if `go test -list` fails and
/// `ResolveError::Io` if a file cannot be created. Files created before the
/// failure are removed.
pub async fn create_placeholders(
    packages: &HashMap<String, Package>,
    included: &[String],
) -> Result<Placeholders, ResolveError> {
    if included.is_empty() {
        return Ok(Placeholders::default());
    }

    let mut args = vec![
        "test".to_string(),
        "-list".to_string(),
        ".".to_string(),
        "-json".to_string(),
    ];
    args.extend(included.iter().cloned());

    let events: Vec<TestEvent> = collect_records(&args, JsonDecoder::new()).await?;
    let without_tests: Vec<String> = events
        .into_iter()
        .filter(|e| e.action == Action::Skip && e.is_package_level())
        .map(|e| e.package)
        .collect();
    debug!(count = without_tests.len(), "packages without test files");

    plant_placeholders(packages, &without_tests)
}

/// Create `dummy_*_test.go` in the directory of each of `without_tests`
///
/// # Errors
///
/// Returns `ResolveError::Io` if a file cannot be created or written.
pub fn plant_placeholders(
    packages: &HashMap<String, Package>,
    without_tests: &[String],
) -> Result<Placeholders, ResolveError> {
    let mut placeholders = Placeholders::default();

    for import_path in without_tests {
        let Some(package) = packages.get(import_path) else {
            warn!(package = %import_path, "no listing for package, skipping placeholder");
            continue;
        };

        let file = placeholder_file(Path::new(&package.dir), &package.name)?;
        debug!(package = %import_path, path = %file.path().display(), "created placeholder test");
        placeholders.files.push(file);
        placeholders.packages.insert(import_path.clone());
    }

    Ok(placeholders)
}

fn placeholder_file(dir: &Path, package_name: &str) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("dummy_")
        .suffix("_test.go")
        .tempfile_in(dir)?;
    writeln!(file, "package {package_name}")?;
    file.flush()?;
    Ok(file)
}

/// Run `go` with `args` and gather every decoded record
async fn collect_records<D>(args: &[String], decoder: D) -> Result<Vec<D::Record>, ResolveError>
where
    D: RecordDecoder,
{
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let collector = tokio::spawn(async move {
        let mut records = Vec::new();
        while let Some(record) = rx.recv().await {
            records.push(record);
        }
        records
    });

    let produced = run_streaming("go", args, b"", decoder, tx, &mut tokio::io::sink()).await;
    let records = collector.await.map_err(io::Error::other)?;
    produced?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn package(dir: &Path, import_path: &str, name: &str) -> Package {
        Package {
            dir: dir.display().to_string(),
            import_path: import_path.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_exclude_packages_table() {
        struct Case {
            name: &'static str,
            packages: &'static [&'static str],
            patterns: &'static [&'static str],
            included: &'static [&'static str],
            excluded: Option<&'static [&'static str]>,
        }

        let cases = [
            Case {
                name: "empty excludes",
                packages: &["one", "two", "three"],
                patterns: &[],
                included: &["one", "two", "three"],
                excluded: None,
            },
            Case {
                name: "one exclude",
                packages: &["one", "two", "three"],
                patterns: &["two"],
                included: &["one", "three"],
                excluded: Some(&["two"]),
            },
            Case {
                name: "prefix exclude",
                packages: &["zero", "one/package", "one/other", "two", "not/one", "three"],
                patterns: &["one"],
                included: &["zero", "two", "not/one", "three"],
                excluded: Some(&["one/package", "one/other"]),
            },
            Case {
                name: "regex",
                packages: &["zero", "one/package", "one/other", "two/package", "two/other", "three"],
                patterns: &[".*/package"],
                included: &["zero", "one/other", "two/other", "three"],
                excluded: Some(&["one/package", "two/package"]),
            },
            Case {
                name: "empty string ignored",
                packages: &["one", "two", "three"],
                patterns: &[""],
                included: &["one", "two", "three"],
                excluded: None,
            },
            Case {
                name: "no match",
                packages: &["one", "two"],
                patterns: &["three"],
                included: &["one", "two"],
                excluded: None,
            },
        ];

        for case in cases {
            let (included, excluded) =
                exclude_packages(&strings(case.packages), &strings(case.patterns))
                    .unwrap_or_else(|e| panic!("{}: {e}", case.name));
            assert_eq!(included, strings(case.included), "{}", case.name);
            assert_eq!(excluded, case.excluded.map(strings), "{}", case.name);
        }
    }

    #[test]
    fn test_exclude_invalid_pattern() {
        let result = exclude_packages(&strings(&["one"]), &strings(&["ok", "("]));
        match result {
            Err(ResolveError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "("),
            other => panic!("expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn test_from_listing_keeps_selected_packages() {
        let dir = Path::new("/src/app");
        let listed = vec![
            package(dir, "example.com/app", "app"),
            package(dir, "example.com/app/gen/pb", "pb"),
            package(dir, "example.com/app/store", "store"),
        ];

        let resolution =
            from_listing(listed, &strings(&["example.com/app/gen"])).expect("resolution");

        assert_eq!(
            resolution.included,
            strings(&["example.com/app", "example.com/app/store"])
        );
        assert_eq!(
            resolution.excluded,
            Some(strings(&["example.com/app/gen/pb"]))
        );
        assert_eq!(resolution.packages.len(), 2);
        assert_eq!(resolution.packages["example.com/app/store"].name, "store");
    }

    #[test]
    fn test_plant_placeholders_removed_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let packages: HashMap<String, Package> = [
            ("example.com/app/util".to_string(), package(dir.path(), "example.com/app/util", "util")),
        ]
        .into_iter()
        .collect();

        let placeholders = plant_placeholders(
            &packages,
            &strings(&["example.com/app/util", "example.com/app/unknown"]),
        )
        .expect("placeholders");

        assert_eq!(placeholders.len(), 1);
        assert!(placeholders.packages().contains("example.com/app/util"));

        let path = placeholders.paths().remove(0);
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name")
            .to_string();
        assert!(file_name.starts_with("dummy_"), "{file_name}");
        assert!(file_name.ends_with("_test.go"), "{file_name}");
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(
            std::fs::read_to_string(&path).expect("read placeholder"),
            "package util\n"
        );

        drop(placeholders);
        assert!(!path.exists());
    }

    #[test]
    fn test_plant_placeholders_missing_dir_is_error() {
        let packages: HashMap<String, Package> = [(
            "example.com/gone".to_string(),
            package(Path::new("/nonexistent/gotestiful/dir"), "example.com/gone", "gone"),
        )]
        .into_iter()
        .collect();

        let result = plant_placeholders(&packages, &strings(&["example.com/gone"]));
        assert!(matches!(result, Err(ResolveError::Io(_))));
    }

    #[tokio::test]
    async fn test_create_placeholders_without_packages_is_empty() {
        let placeholders = create_placeholders(&HashMap::new(), &[])
            .await
            .expect("no go invocation needed");
        assert!(placeholders.is_empty());
    }
}
