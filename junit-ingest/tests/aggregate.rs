use std::time::Duration;

use junit_ingest::{NonSuccessKind, Suite, Test, TestError, Totals};
use pretty_assertions::assert_eq;

fn passed(name: &str, micros: u64) -> Test {
    let mut test = Test::new(name);
    test.duration = Duration::from_micros(micros);
    test
}

fn failed(name: &str, micros: u64) -> Test {
    let mut test = passed(name, micros);
    test.fail(TestError::new(NonSuccessKind::Failure));
    test
}

fn grandchild(name: &str) -> Suite {
    let mut suite = Suite::new(name);
    suite.add_test(passed("passes", 1_500));
    suite.add_test(failed("fails", 1_000));
    suite
}

/// root(1 passed) > child(1 passed, 1 failed) > two grandchildren(1 passed, 1 failed)
fn nested_tree() -> Suite {
    let mut child = Suite::new("child");
    child.add_test(passed("passes", 2_000));
    child.add_test(failed("fails", 489));
    child.add_suite(grandchild("grandchild 1"));
    child.add_suite(grandchild("grandchild 2"));

    let mut root = Suite::new("root");
    root.add_test(passed("passes", 1_000));
    root.add_suite(child);
    root
}

fn assert_totals_invariant(suite: &Suite) {
    let totals = &suite.totals;
    assert_eq!(
        totals.tests,
        totals.passed + totals.skipped + totals.failed + totals.error,
        "suite {:?}",
        suite.name
    );
    suite.suites.iter().for_each(assert_totals_invariant);
}

#[test]
fn aggregate_nested_suites() {
    let mut root = nested_tree();
    root.aggregate();

    assert_eq!(
        root.totals,
        Totals {
            tests: 7,
            passed: 4,
            skipped: 0,
            failed: 3,
            error: 0,
            duration: Duration::from_micros(8_489),
        }
    );
    assert_eq!(
        root.suites[0].totals,
        Totals {
            tests: 6,
            passed: 3,
            skipped: 0,
            failed: 3,
            error: 0,
            duration: Duration::from_micros(7_489),
        }
    );
    for grandchild in root.suites[0].suites.iter() {
        assert_eq!(
            grandchild.totals,
            Totals {
                tests: 2,
                passed: 1,
                skipped: 0,
                failed: 1,
                error: 0,
                duration: Duration::from_micros(2_500),
            }
        );
    }
    assert_totals_invariant(&root);
}

#[test]
fn aggregate_nested_suites_from_xml() {
    let suites = junit_ingest::ingest(
        r#"<testsuite name="root">
            <testcase name="passes" time="0.001"/>
            <testsuite name="child">
                <testcase name="passes" time="0.002"/>
                <testcase name="fails" time="0.000489"><failure/></testcase>
                <testsuite name="grandchild 1">
                    <testcase name="passes" time="0.0015"/>
                    <testcase name="fails" time="0.001"><failure/></testcase>
                </testsuite>
                <testsuite name="grandchild 2">
                    <testcase name="passes" time="0.0015"/>
                    <testcase name="fails" time="0.001"><failure/></testcase>
                </testsuite>
            </testsuite>
        </testsuite>"#,
    )
    .unwrap();

    assert_eq!(suites.len(), 1);
    let mut expected = nested_tree();
    expected.aggregate();
    assert_eq!(suites[0].totals, expected.totals);
    assert_eq!(suites[0].suites[0].totals, expected.suites[0].totals);
}

#[test]
fn aggregate_counts_every_status() {
    let mut suite = Suite::new("statuses");
    suite.add_test(passed("passes", 1));
    let mut skipped = passed("skips", 2);
    skipped.skip("later");
    suite.add_test(skipped);
    suite.add_test(failed("fails", 3));
    let mut errored = passed("errors", 4);
    errored.fail(TestError::new(NonSuccessKind::Error));
    suite.add_test(errored);

    let predicates = suite
        .tests
        .iter()
        .map(|t| (t.is_passed(), t.is_skipped(), t.is_failed(), t.is_error()))
        .collect::<Vec<_>>();
    assert_eq!(
        predicates,
        vec![
            (true, false, false, false),
            (false, true, false, false),
            (false, false, true, false),
            (false, false, false, true),
        ]
    );

    suite.aggregate();

    assert_eq!(
        suite.totals,
        Totals {
            tests: 4,
            passed: 1,
            skipped: 1,
            failed: 1,
            error: 1,
            duration: Duration::from_micros(10),
        }
    );
}

#[test]
fn aggregate_saturates_huge_durations() {
    let forever = |name: &str| {
        let mut test = Test::new(name);
        test.duration = Duration::MAX;
        test
    };
    let mut nested = Suite::new("nested");
    nested.add_test(forever("forever"));
    let mut suite = Suite::new("huge");
    suite.add_test(passed("passes", 1));
    suite.add_test(forever("forever again"));
    suite.add_suite(nested);

    suite.aggregate();

    assert_eq!(suite.totals.tests, 3);
    assert_eq!(suite.suites[0].totals.duration, Duration::MAX);
    assert_eq!(suite.totals.duration, Duration::MAX);
}

#[test]
fn aggregate_empty_suite() {
    let mut suite = Suite::new("empty");
    suite.aggregate();

    assert_eq!(suite.totals, Totals::default());
}

#[test]
fn totals_are_stale_until_reaggregated() {
    let mut root = nested_tree();
    root.aggregate();
    let before = root.totals;

    root.add_test(failed("late", 11));
    root.suites[0].suites[0].add_test(passed("later", 1));
    assert_eq!(root.totals, before);

    root.aggregate();
    assert_eq!(root.totals.tests, 9);
    assert_eq!(root.totals.passed, 5);
    assert_eq!(root.totals.failed, 4);
    assert_eq!(root.totals.duration, Duration::from_micros(8_501));
    assert_eq!(root.suites[0].suites[0].totals.tests, 3);
}

#[test]
fn aggregate_is_idempotent() {
    let mut root = nested_tree();
    root.aggregate();
    let once = root.clone();
    root.aggregate();

    assert_eq!(root, once);
}
