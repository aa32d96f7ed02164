use std::{ops::AddAssign, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Properties = IndexMap<String, String>;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The test ran without a failure or an error.
    #[default]
    Passed,
    /// The test was intentionally not run.
    Skipped,
    /// The test ran and violated a declared expectation, such as an assertion.
    Failed,
    /// The test ran and hit an unexpected problem, such as an uncaught exception.
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonSuccessKind {
    Failure,
    Error,
}

impl From<NonSuccessKind> for TestStatus {
    fn from(kind: NonSuccessKind) -> Self {
        match kind {
            NonSuccessKind::Failure => TestStatus::Failed,
            NonSuccessKind::Error => TestStatus::Error,
        }
    }
}

/// Detail attached to a failed or errored test. Displays as its body, which is
/// usually a stack trace.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{body}")]
pub struct TestError {
    pub kind: NonSuccessKind,
    pub message: String,
    pub r#type: String,
    pub body: String,
}

impl TestError {
    pub fn new(kind: NonSuccessKind) -> Self {
        Self {
            kind,
            message: String::new(),
            r#type: String::new(),
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub name: String,
    pub classname: String,
    pub duration: Duration,
    pub status: TestStatus,
    /// Reason given by a skipped marker.
    pub message: String,
    /// Present iff `status` is `Failed` or `Error`.
    pub error: Option<TestError>,
    pub properties: Properties,
    pub system_out: String,
    pub system_err: String,
}

impl Test {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn skip<T: Into<String>>(&mut self, message: T) {
        self.status = TestStatus::Skipped;
        self.message = message.into();
        self.error = None;
    }

    pub fn fail(&mut self, error: TestError) {
        self.status = error.kind.into();
        self.error = Some(error);
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TestStatus::Skipped
    }

    pub fn is_failed(&self) -> bool {
        self.status == TestStatus::Failed
    }

    pub fn is_error(&self) -> bool {
        self.status == TestStatus::Error
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub tests: usize,
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub error: usize,
    pub duration: Duration,
}

impl AddAssign<&Totals> for Totals {
    fn add_assign(&mut self, rhs: &Totals) {
        self.tests += rhs.tests;
        self.passed += rhs.passed;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
        self.error += rhs.error;
        self.duration = self.duration.saturating_add(rhs.duration);
    }
}

impl AddAssign<&Test> for Totals {
    fn add_assign(&mut self, test: &Test) {
        self.tests += 1;
        match test.status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Error => self.error += 1,
        };
        self.duration = self.duration.saturating_add(test.duration);
    }
}

/// A named group of tests, possibly containing nested suites.
///
/// `totals` is a snapshot: it is only refreshed by [`Suite::aggregate`], so it
/// goes stale when tests or suites are added afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,
    pub package: String,
    pub properties: Properties,
    pub tests: Vec<Test>,
    pub suites: Vec<Suite>,
    pub system_out: String,
    pub system_err: String,
    pub totals: Totals,
}

impl Suite {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_test(&mut self, test: Test) {
        self.tests.push(test);
    }

    pub fn add_suite(&mut self, suite: Suite) {
        self.suites.push(suite);
    }

    /// Recomputes `totals` for this suite and, first, for every nested suite.
    pub fn aggregate(&mut self) {
        let mut totals = Totals::default();
        for suite in self.suites.iter_mut() {
            suite.aggregate();
            totals += &suite.totals;
        }
        for test in self.tests.iter() {
            totals += test;
        }
        self.totals = totals;
    }
}
