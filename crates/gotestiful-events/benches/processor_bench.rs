use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gotestiful_events::{Action, EventProcessor, ProcessOptions, TestEvent};
use std::hint::black_box;

/// Build the event stream of `packages` packages with `tests` tests each,
/// every fifth test failing
fn synthetic_run(packages: usize, tests: usize) -> (Vec<String>, Vec<TestEvent>) {
    let names: Vec<String> = (0..packages)
        .map(|p| format!("example.com/bench/pkg{p}"))
        .collect();
    let mut events = Vec::with_capacity(packages * (tests * 5 + 3));

    for package in &names {
        for t in 0..tests {
            let test = format!("TestCase{t}");
            let failing = t % 5 == 0;
            events.push(TestEvent::new(Action::Run, package.as_str()).with_test(test.as_str()));
            events.push(
                TestEvent::new(Action::Output, package.as_str())
                    .with_test(test.as_str())
                    .with_output(format!("=== RUN   {test}\n")),
            );
            events.push(
                TestEvent::new(Action::Output, package.as_str())
                    .with_test(test.as_str())
                    .with_output(format!("    case_test.go:{t}: checking case {t}\n")),
            );
            let marker = if failing { "FAIL" } else { "PASS" };
            events.push(
                TestEvent::new(Action::Output, package.as_str())
                    .with_test(test.as_str())
                    .with_output(format!("--- {marker}: {test} (0.00s)\n")),
            );
            let action = if failing { Action::Fail } else { Action::Pass };
            events.push(
                TestEvent::new(action, package.as_str())
                    .with_test(test.as_str())
                    .with_elapsed(0.0),
            );
        }
        events.push(
            TestEvent::new(Action::Output, package.as_str())
                .with_output("coverage: 71.4% of statements\n"),
        );
        events.push(
            TestEvent::new(Action::Output, package.as_str())
                .with_output(format!("FAIL\t{package}\t0.321s\n")),
        );
        events.push(TestEvent::new(Action::Fail, package.as_str()).with_elapsed(0.321));
    }

    (names, events)
}

fn processor_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor");

    for packages in [1, 10, 50].iter() {
        let (names, events) = synthetic_run(*packages, 40);
        group.bench_with_input(
            BenchmarkId::new("handle_stream", packages),
            &events,
            |b, events| {
                b.iter(|| {
                    let mut emitted = 0usize;
                    let mut processor =
                        EventProcessor::new(ProcessOptions::new(names.clone()), |line: &str| {
                            emitted += line.len();
                        });
                    for event in events.iter().cloned() {
                        processor.handle(event);
                    }
                    black_box(processor.finish());
                    black_box(emitted)
                })
            },
        );
    }

    group.finish();
}

fn parse_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    let line = r#"{"Time":"2024-03-04T10:15:00.102200+01:00","Action":"output","Package":"example.com/shop/cart","Test":"TestTotal","Output":"    cart_test.go:42: total = 41, want 42\n"}"#;
    group.bench_function("event_line", |b| {
        b.iter(|| TestEvent::parse(black_box(line)).expect("parse failed"))
    });

    group.finish();
}

criterion_group!(benches, processor_benchmarks, parse_benchmarks);
criterion_main!(benches);
