// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Property-based tests for gotestiful-events
//!
//! These tests feed arbitrary event streams to the processor and check the
//! invariants of the report and the aggregate result.

use proptest::prelude::*;

use gotestiful_events::coverage::{ProfileTotals, average};
use gotestiful_events::{Action, EventProcessor, ProcessOptions, RunResult, TestEvent};

// ============================================================================
// Strategies
// ============================================================================

fn arbitrary_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Run),
        Just(Action::Pass),
        Just(Action::Fail),
        Just(Action::Skip),
        Just(Action::Output),
        Just(Action::Pause),
        Just(Action::Cont),
        Just(Action::Other),
    ]
}

/// Output lines mixing framework markers with free text
fn arbitrary_output() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("=== RUN   TestA\n".to_string()),
        Just("--- PASS: TestA (0.00s)\n".to_string()),
        Just("--- FAIL: TestA (0.00s)\n".to_string()),
        Just("--- SKIP: TestA (0.00s)\n".to_string()),
        Just("    --- FAIL: TestA/sub (0.00s)\n".to_string()),
        Just("coverage: 42.5% of statements\n".to_string()),
        Just("coverage: [no statements]\n".to_string()),
        Just("PASS\n".to_string()),
        Just("ok  \tpkg/a\t0.1s\n".to_string()),
        Just("\t\t\n".to_string()),
        Just("   \n".to_string()),
        ".{0,40}".prop_map(|s| format!("{s}\n")),
    ]
}

fn arbitrary_event() -> impl Strategy<Value = TestEvent> {
    (
        arbitrary_action(),
        prop_oneof![Just("pkg/a"), Just("pkg/b"), Just("pkg/unlisted/long")],
        prop_oneof![Just(""), Just("TestA"), Just("TestB"), Just("TestA/sub")],
        proptest::option::of(0.0f64..5.0),
        arbitrary_output(),
    )
        .prop_map(|(action, package, test, elapsed, output)| {
            let mut event = TestEvent::new(action, package).with_test(test);
            event.elapsed = elapsed;
            if action == Action::Output {
                event.output = Some(output);
            }
            event
        })
}

fn replay(events: Vec<TestEvent>, verbose: bool) -> (Vec<String>, RunResult) {
    let options = ProcessOptions {
        verbose,
        ..ProcessOptions::new(vec!["pkg/a".to_string(), "pkg/b".to_string()])
    };
    let mut lines = Vec::new();
    let result = {
        let mut processor = EventProcessor::new(options, |line: &str| lines.push(line.to_string()));
        for event in events {
            processor.handle(event);
        }
        processor.finish()
    };
    (lines, result)
}

// ============================================================================
// Property Tests: Processor
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: Streamed lines are never blank and never end in whitespace
    #[test]
    fn streamed_lines_are_trimmed(
        events in prop::collection::vec(arbitrary_event(), 0..60),
        verbose in any::<bool>(),
    ) {
        let (lines, _) = replay(events, verbose);

        // the summary block starts at the last blank line
        let summary_start = lines
            .iter()
            .rposition(|l| l.is_empty())
            .expect("summary separator");
        for line in &lines[..summary_start] {
            prop_assert!(!line.is_empty());
            prop_assert_eq!(line.trim_end(), line.as_str());
        }
    }

    /// Property: Failed test names are sorted and distinct
    #[test]
    fn failed_tests_sorted_and_distinct(events in prop::collection::vec(arbitrary_event(), 0..60)) {
        let (_, result) = replay(events, false);

        let mut expected = result.failed_tests.clone();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(result.failed_tests, expected);
    }

    /// Property: Overall coverage stays within 0-100
    #[test]
    fn coverage_within_bounds(events in prop::collection::vec(arbitrary_event(), 0..60)) {
        let (_, result) = replay(events, false);

        prop_assert!(result.coverage.percentage >= 0.0);
        prop_assert!(result.coverage.percentage <= 100.0);
        prop_assert!(!result.coverage.is_exact);
    }

    /// Property: Only package-level fail events mark packages failed
    #[test]
    fn failed_packages_match_fail_events(events in prop::collection::vec(arbitrary_event(), 0..60)) {
        let expected = events
            .iter()
            .filter(|e| e.action == Action::Fail && e.is_package_level())
            .count();
        let (_, result) = replay(events, false);

        prop_assert_eq!(result.failed_packages.len(), expected);
        prop_assert_eq!(result.tested, 2);
    }
}

// ============================================================================
// Property Tests: Coverage
// ============================================================================

proptest! {
    /// Property: The average lies between the smallest and largest sample
    #[test]
    fn average_within_sample_range(samples in prop::collection::vec(0.0f64..=100.0, 1..20)) {
        let avg = average(&samples);
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        prop_assert!(avg >= min - 1e-9);
        prop_assert!(avg <= max + 1e-9);
    }

    /// Property: Profile totals never cover more than they count
    #[test]
    fn profile_covered_never_exceeds_statements(
        blocks in prop::collection::vec((0u32..50, 0u32..3), 0..30),
    ) {
        let mut totals = ProfileTotals::default();
        totals.add_line("mode: set");
        for (statements, hits) in &blocks {
            totals.add_line(&format!("pkg/a.go:1.1,2.2 {statements} {hits}"));
        }

        prop_assert!(totals.covered <= totals.statements);
        if let Some(percentage) = totals.percentage() {
            prop_assert!((0.0..=100.0).contains(&percentage));
        }
    }

    /// Property: A single line covers either all of its statements or none
    #[test]
    fn profile_line_covers_all_or_nothing(line in ".{0,80}") {
        let mut totals = ProfileTotals::default();
        totals.add_line(&line);
        prop_assert!(
            totals.covered == 0.0 || totals.covered.to_bits() == totals.statements.to_bits()
        );
    }
}
