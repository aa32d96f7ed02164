use std::time::Duration;

use assert_matches::assert_matches;
use junit_ingest::{
    ingest, ingest_reader, ContentError, IngestError, NonSuccessKind, ParseError, Suite, TestStatus,
    Totals,
};
use junit_mock::{JunitMock, MockTotals, Options};
use pretty_assertions::assert_eq;
use quick_junit::{Property, Report, TestCase, TestCaseStatus, TestSuite};

fn totals_of(mock: &MockTotals) -> Totals {
    Totals {
        tests: mock.tests,
        passed: mock.passed,
        skipped: mock.skipped,
        failed: mock.failed,
        error: mock.error,
        duration: mock.duration,
    }
}

fn assert_totals_consistent(suite: &Suite) {
    let mut expected = Totals::default();
    for nested in suite.suites.iter() {
        assert_totals_consistent(nested);
        expected += &nested.totals;
    }
    for test in suite.tests.iter() {
        expected += test;
    }
    assert_eq!(suite.totals, expected);
    assert_eq!(
        suite.totals.tests,
        suite.totals.passed + suite.totals.skipped + suite.totals.failed + suite.totals.error
    );
}

fn for_each_test<F: FnMut(&junit_ingest::Test)>(suite: &Suite, f: &mut F) {
    suite.tests.iter().for_each(&mut *f);
    for nested in suite.suites.iter() {
        for_each_test(nested, f);
    }
}

#[test]
fn ingest_single_suite() {
    let suites = ingest(
        br#"<testsuite errors="0" failures="1" file="Foo.java"><testcase name="unit tests" file="Foo.java"/></testsuite>"#,
    )
    .unwrap();

    assert_eq!(suites.len(), 1);
    let suite = &suites[0];
    assert_eq!(suite.name, "");
    assert_eq!(suite.package, "");
    assert_eq!(
        suite
            .properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect::<Vec<_>>(),
        vec![("errors", "0"), ("failures", "1"), ("file", "Foo.java")]
    );

    let test = &suite.tests[0];
    assert_eq!(test.name, "unit tests");
    assert_eq!(test.classname, "");
    assert_eq!(test.duration, Duration::ZERO);
    assert_eq!(test.status, TestStatus::Passed);
    assert_eq!(test.error, None);
    assert_eq!(
        test.properties.get("file").map(String::as_str),
        Some("Foo.java")
    );

    assert_eq!(
        suite.totals,
        Totals {
            tests: 1,
            passed: 1,
            ..Default::default()
        }
    );
}

#[test]
fn ingest_blank_input() {
    assert_eq!(ingest(b"").unwrap(), Vec::<Suite>::new());
    assert_eq!(ingest(b"  \n  ").unwrap(), Vec::<Suite>::new());
    assert_eq!(
        ingest(b"<?xml version=\"1.0\"?>\n<testsuites/>").unwrap(),
        Vec::<Suite>::new()
    );
}

#[test]
fn ingest_malformed_document() {
    assert_matches!(
        ingest(b"<testsuite><testcase></testsuite>"),
        Err(IngestError::Parse(..))
    );
}

#[test]
fn ingest_malformed_content() {
    let result = ingest(b"<testsuite><testcase><system-out>stray ]]&gt; is fine, stray ]]> is not</system-out></testcase></testsuite>");

    assert_matches!(
        result,
        Err(IngestError::Content(ContentError::UnmatchedCdataEnd))
    );
}

#[test]
fn ingest_deeply_nested_suites() {
    let depth = 100;
    let xml = r#"<testsuite><testcase name="t" time="1"/>"#.repeat(depth)
        + &"</testsuite>".repeat(depth);

    let suites = ingest(xml).unwrap();

    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0].totals.tests, depth);
    assert_eq!(suites[0].totals.duration, Duration::from_secs(depth as u64));
}

#[test]
fn ingest_rejects_suites_nested_past_the_limit() {
    for depth in [2_000, 20_000] {
        let xml = "<testsuite>".repeat(depth) + &"</testsuite>".repeat(depth);

        assert_matches!(
            ingest(xml),
            Err(IngestError::Parse(ParseError::TooDeep(..)))
        );
    }
}

#[test]
fn ingest_from_reader() {
    let xml = br#"<testsuites>
        <testsuite name="a"><testcase name="t" time="0.5"><skipped/></testcase></testsuite>
    </testsuites>"#;

    let suites = ingest_reader(&xml[..]).unwrap();

    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0].name, "a");
    assert_eq!(suites[0].totals.skipped, 1);
    assert_eq!(suites[0].totals.duration, Duration::from_millis(500));
}

fn mock_options(seed: u64, render_testsuites: bool) -> Options {
    let mut options = Options::default();
    options.global.seed = Some(seed);
    options.document.do_not_render_testsuites_element = !render_testsuites;
    options
}

#[test]
fn ingest_generated_documents() {
    let mut mock = JunitMock::new(mock_options(0, true));
    for (seed, render_testsuites) in [(0, true), (1, false), (42, true), (1337, false)] {
        mock.set_options(mock_options(seed, render_testsuites));
        assert_eq!(mock.get_seed(), seed);
        let document = mock.generate_document().unwrap();

        let suites = ingest(&document.xml).unwrap();

        assert_eq!(
            suites.iter().map(|s| s.totals).collect::<Vec<_>>(),
            document.suite_totals.iter().map(totals_of).collect::<Vec<_>>(),
            "seed {}",
            seed
        );
        for suite in suites.iter() {
            assert_totals_consistent(suite);
            for_each_test(suite, &mut |test| match test.status {
                TestStatus::Failed | TestStatus::Error => {
                    let error = test.error.as_ref().unwrap();
                    assert!(error.body.contains("<expected> & \"actual\""));
                    assert!(!error.message.is_empty());
                }
                TestStatus::Passed | TestStatus::Skipped => assert_eq!(test.error, None),
            });
        }
    }
}

#[test]
fn ingest_generated_cdata_is_verbatim() {
    let mut options = mock_options(7, true);
    options.document.cdata_percentage = 100;
    options.test_case.test_case_count_range = vec![5, 10];
    options.test_case.test_case_success_to_skip_to_fail_to_error_percentage = vec![vec![0, 0, 100, 0]];
    let mut mock = JunitMock::new(options);
    let document = mock.generate_document().unwrap();

    let suites = ingest(&document.xml).unwrap();

    let mut failures = 0;
    for suite in suites.iter() {
        for_each_test(suite, &mut |test| {
            if let Some(error) = test.error.as_ref() {
                failures += 1;
                assert_eq!(error.kind, NonSuccessKind::Failure);
                assert_eq!(error.r#type, "AssertionError");
                assert!(error.body.contains("&lt;not an entity&gt;"));
            }
        });
    }
    assert!(failures > 0);
}

#[test]
fn ingest_quick_junit_report() {
    let mut passing = TestCase::new("adds", TestCaseStatus::success());
    passing.set_classname("math.Adder");
    passing.set_time(Duration::from_millis(1_500));
    passing.set_system_out("1 + 1 = 2");

    let mut failure = TestCaseStatus::non_success(quick_junit::NonSuccessKind::Failure);
    failure.set_message("arithmetic is broken");
    failure.set_type("AssertionError");
    failure.set_description("2 + 2 < 5 && 2 + 2 != 4");
    let mut failing = TestCase::new("adds badly", failure);
    failing.set_classname("math.Adder");
    failing.set_time(Duration::from_millis(250));

    let mut suite = TestSuite::new("math");
    suite.add_property(Property::new("tests", "3"));
    suite.add_test_cases([passing, failing]);

    let mut report = Report::new("report");
    report.add_test_suite(suite);
    let xml = report.to_string().unwrap();

    let suites = ingest(xml).unwrap();

    assert_eq!(suites.len(), 1);
    let suite = &suites[0];
    assert_eq!(suite.name, "math");
    assert_eq!(suite.properties.get("tests").map(String::as_str), Some("3"));
    assert_eq!(suite.properties.get("failures").map(String::as_str), Some("1"));

    assert_eq!(suite.tests.len(), 2);
    let passing = &suite.tests[0];
    assert_eq!(passing.name, "adds");
    assert_eq!(passing.classname, "math.Adder");
    assert_eq!(passing.duration, Duration::from_millis(1_500));
    assert_eq!(passing.system_out, "1 + 1 = 2");

    let failing = &suite.tests[1];
    assert_eq!(failing.status, TestStatus::Failed);
    assert_eq!(failing.duration, Duration::from_millis(250));
    let error = failing.error.as_ref().unwrap();
    assert_eq!(error.message, "arithmetic is broken");
    assert_eq!(error.r#type, "AssertionError");
    assert_eq!(error.body, "2 + 2 < 5 && 2 + 2 != 4");

    assert_eq!(
        suite.totals,
        Totals {
            tests: 2,
            passed: 1,
            skipped: 0,
            failed: 1,
            error: 0,
            duration: Duration::from_millis(1_750),
        }
    );
}

#[test]
fn ingested_suites_serialize_lowercase_enums() {
    let suites = ingest(
        br#"<testsuite name="s">
            <testcase name="t"><failure message="m">body</failure></testcase>
        </testsuite>"#,
    )
    .unwrap();

    let json = serde_json::to_value(&suites).unwrap();
    let test = &json[0]["tests"][0];
    assert_eq!(test["status"], "failed");
    assert_eq!(test["error"]["kind"], "failure");
    assert_eq!(test["error"]["body"], "body");
    assert_eq!(json[0]["totals"]["failed"], 1);
}
