use std::fs::File;
use std::io::Write;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use clap::Parser;
use fake::Fake;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rand::prelude::*;
use rand::rngs::StdRng;

macro_rules! percentages_parser {
    ($func_name:ident, $num_percentages:literal) => {
        fn $func_name(argument: &str) -> std::result::Result<Vec<u8>, clap::Error> {
            argument
                .split(',')
                .enumerate()
                .try_fold((0_u8, Vec::new()), |mut acc, (i, percentage_str)| {
                    if i >= $num_percentages {
                        return Err(clap::Error::raw(
                            clap::error::ErrorKind::InvalidValue,
                            format!("More than {} percentages provided", $num_percentages),
                        ));
                    }
                    let percentage = percentage_str
                        .parse::<u8>()
                        .map_err(|e| clap::Error::raw(clap::error::ErrorKind::InvalidValue, e))?;

                    if percentage > 100 {
                        return Err(clap::Error::raw(
                            clap::error::ErrorKind::InvalidValue,
                            format!("Percentage at index {} is greater than 100", i),
                        ));
                    }

                    acc.0 += percentage;

                    if acc.0 > 100 {
                        return Err(clap::Error::raw(
                            clap::error::ErrorKind::InvalidValue,
                            "Sum of percentages are greater than 100",
                        ));
                    }

                    acc.1.push(percentage);

                    Ok(acc)
                })
                .map(|v| v.1)
        }
    };
}

#[derive(Debug, Parser, Clone)]
pub struct Options {
    #[command(flatten, next_help_heading = "Global Options")]
    pub global: GlobalOptions,

    #[command(flatten, next_help_heading = "Document Options")]
    pub document: DocumentOptions,

    #[command(flatten, next_help_heading = "Test Suite Options")]
    pub test_suite: TestSuiteOptions,

    #[command(flatten, next_help_heading = "Test Case Options")]
    pub test_case: TestCaseOptions,
}

impl Default for Options {
    fn default() -> Self {
        Options::try_parse_from([""]).unwrap()
    }
}

#[test]
fn options_can_be_defaulted_without_panicing() {
    Options::default();
}

#[derive(Debug, Parser, Clone)]
#[group()]
pub struct GlobalOptions {
    /// Seed for all generated data, defaults to randomly generated seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Timestamp for all data to be based on, defaults to now
    #[arg(long)]
    pub timestamp: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Parser, Clone)]
#[group()]
pub struct DocumentOptions {
    /// The number of documents to generate
    #[arg(long, default_value = "1")]
    pub document_count: usize,

    /// Serialize the top-level suites without a wrapping `testsuites` element
    #[arg(long)]
    pub do_not_render_testsuites_element: bool,

    /// The chance of free-form text being split into escaped text and CDATA sections
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value = "50")]
    pub cdata_percentage: u8,
}

#[derive(Debug, Parser, Clone)]
#[group()]
pub struct TestSuiteOptions {
    /// The number of top-level test suites with random names to generate
    #[arg(long, default_value = "3")]
    pub test_suite_random_count: usize,

    /// Inclusive range of the number of suites nested in each suite
    #[arg(long, num_args = 1..=2, value_names = ["COUNT_RANGE_START", "COUNT_RANGE_END"], default_values = ["0", "2"])]
    pub test_suite_nested_count_range: Vec<usize>,

    /// How deep suites may be nested below the top-level suites
    #[arg(long, default_value = "2")]
    pub test_suite_max_depth: usize,

    /// The chance of a property block being added to the test suite
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value = "50")]
    pub test_suite_properties_percentage: u8,

    /// The chance of a system out message being added to the test suite
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value = "50")]
    pub test_suite_sys_out_percentage: u8,

    /// The chance of a system error message being added to the test suite
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value = "50")]
    pub test_suite_sys_err_percentage: u8,
}

percentages_parser!(four_percentages_parser, 4);

#[derive(Debug, Parser, Clone)]
#[group()]
pub struct TestCaseOptions {
    /// Inclusive range of the number of test cases in each suite
    #[arg(long, num_args = 1..=2, value_names = ["COUNT_RANGE_START", "COUNT_RANGE_END"], default_values = ["0", "10"])]
    pub test_case_count_range: Vec<usize>,

    /// The chance of a system out message being added to the test case
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value = "50")]
    pub test_case_sys_out_percentage: u8,

    /// The chance of a system error message being added to the test case
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100), default_value = "50")]
    pub test_case_sys_err_percentage: u8,

    /// Inclusive range of test case durations
    #[arg(long, num_args = 1..=2, value_names = ["DURATION_RANGE_START", "DURATION_RANGE_END"], default_values = ["1ms", "30m"])]
    pub test_case_duration_range: Vec<humantime::Duration>,

    /// The chance of a test case succeeding, skipping, failing, and erroring (must add up to 100)
    #[arg(long, value_parser = four_percentages_parser, default_value = "25,25,25,25")]
    pub test_case_success_to_skip_to_fail_to_error_percentage: Vec<Vec<u8>>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MockStatus {
    Passed,
    Skipped,
    Failed,
    Error,
}

/// Totals a correct ingester must compute for a generated suite, including
/// every suite nested in it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MockTotals {
    pub tests: usize,
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub error: usize,
    pub duration: Duration,
}

impl AddAssign<&MockTotals> for MockTotals {
    fn add_assign(&mut self, rhs: &MockTotals) {
        self.tests += rhs.tests;
        self.passed += rhs.passed;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
        self.error += rhs.error;
        self.duration += rhs.duration;
    }
}

impl MockTotals {
    fn add_test(&mut self, status: MockStatus, duration: Duration) {
        self.tests += 1;
        match status {
            MockStatus::Passed => self.passed += 1,
            MockStatus::Skipped => self.skipped += 1,
            MockStatus::Failed => self.failed += 1,
            MockStatus::Error => self.error += 1,
        };
        self.duration += duration;
    }
}

#[derive(Debug, Clone)]
pub struct MockDocument {
    pub xml: Vec<u8>,
    /// One entry per top-level suite, in document order.
    pub suite_totals: Vec<MockTotals>,
}

#[derive(Debug, Clone)]
pub struct JunitMock {
    seed: u64,
    options: Options,

    // state for generating documents
    rng: StdRng,
    timestamp: DateTime<FixedOffset>,
}

impl JunitMock {
    pub fn new(options: Options) -> Self {
        let (seed, rng) = JunitMock::rng_from_seed(&options);
        let timestamp = options.global.timestamp.unwrap_or_default();
        Self {
            seed,
            options,
            rng,
            timestamp,
        }
    }

    fn rng_from_seed(options: &Options) -> (u64, StdRng) {
        let seed = options.global.seed.unwrap_or_else(rand::random);
        (seed, StdRng::seed_from_u64(seed))
    }

    pub fn set_options(&mut self, options: Options) {
        let (seed, rng) = JunitMock::rng_from_seed(&options);
        self.seed = seed;
        self.rng = rng;
        self.options = options;
    }

    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    pub fn generate_documents(&mut self) -> Result<Vec<MockDocument>> {
        self.timestamp = self
            .options
            .global
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().fixed_offset());

        (0..self.options.document.document_count)
            .map(|_| self.generate_document())
            .collect()
    }

    pub fn generate_document(&mut self) -> Result<MockDocument> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        let render_testsuites = !self.options.document.do_not_render_testsuites_element;

        if render_testsuites {
            let name: String = fake::faker::company::en::Buzzword().fake_with_rng(&mut self.rng);
            let mut testsuites = BytesStart::new("testsuites");
            testsuites.push_attribute(("name", name.as_str()));
            writer.write_event(Event::Start(testsuites))?;
        }

        let suite_totals = (0..self.options.test_suite.test_suite_random_count)
            .map(|_| self.write_test_suite(&mut writer, 0))
            .collect::<Result<Vec<_>>>()?;

        if render_testsuites {
            writer.write_event(Event::End(BytesEnd::new("testsuites")))?;
        }

        Ok(MockDocument {
            xml: writer.into_inner(),
            suite_totals,
        })
    }

    pub fn write_documents_to_file<T: AsRef<Path>, U: AsRef<[MockDocument]>>(
        &self,
        directory: T,
        documents: U,
    ) -> Result<Vec<PathBuf>> {
        documents.as_ref().iter().enumerate().try_fold(
            Vec::new(),
            |mut acc, (i, document)| -> Result<Vec<PathBuf>> {
                let path = directory.as_ref().join(format!("junit-{}.xml", i));
                let mut file = File::create(&path)?;
                file.write_all(&document.xml)?;
                acc.push(path);
                Ok(acc)
            },
        )
    }

    fn write_test_suite<W: Write>(
        &mut self,
        writer: &mut Writer<W>,
        depth: usize,
    ) -> Result<MockTotals> {
        let name: String = fake::faker::company::en::Buzzword().fake_with_rng(&mut self.rng);
        let package: String = fake::faker::filesystem::en::DirPath().fake_with_rng(&mut self.rng);
        let timestamp = self.timestamp.to_rfc3339();

        let mut test_suite = BytesStart::new("testsuite");
        test_suite.push_attribute(("name", name.as_str()));
        test_suite.push_attribute(("package", package.as_str()));
        test_suite.push_attribute(("timestamp", timestamp.as_str()));
        writer.write_event(Event::Start(test_suite))?;

        if self.rand_bool(self.options.test_suite.test_suite_properties_percentage) {
            self.write_properties(writer)?;
        }

        let mut totals = MockTotals::default();

        let test_case_count_range = self.options.test_case.test_case_count_range.clone();
        let test_case_count = self.rand_in_range(&test_case_count_range);
        for _ in 0..test_case_count {
            let (status, duration) = self.write_test_case(writer)?;
            totals.add_test(status, duration);
        }

        if depth < self.options.test_suite.test_suite_max_depth {
            let nested_count_range = self.options.test_suite.test_suite_nested_count_range.clone();
            let nested_count = self.rand_in_range(&nested_count_range);
            for _ in 0..nested_count {
                let nested_totals = self.write_test_suite(writer, depth + 1)?;
                totals += &nested_totals;
            }
        }

        if self.rand_bool(self.options.test_suite.test_suite_sys_out_percentage) {
            self.write_text_element(writer, "system-out", None)?;
        }
        if self.rand_bool(self.options.test_suite.test_suite_sys_err_percentage) {
            self.write_text_element(writer, "system-err", None)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
        Ok(totals)
    }

    fn write_properties<W: Write>(&mut self, writer: &mut Writer<W>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("properties")))?;
        for _ in 0..self.rng.gen_range(1..4) {
            let name: String = fake::faker::lorem::en::Word().fake_with_rng(&mut self.rng);
            let value = self.fake_sentence();
            let mut property = BytesStart::new("property");
            property.push_attribute(("name", name.as_str()));
            property.push_attribute(("value", value.as_str()));
            writer.write_event(Event::Empty(property))?;
        }
        writer.write_event(Event::End(BytesEnd::new("properties")))?;
        Ok(())
    }

    fn write_test_case<W: Write>(&mut self, writer: &mut Writer<W>) -> Result<(MockStatus, Duration)> {
        let name: String = fake::faker::company::en::Buzzword().fake_with_rng(&mut self.rng);
        let classname: String =
            fake::faker::filesystem::en::DirPath().fake_with_rng(&mut self.rng);
        let file: String = fake::faker::filesystem::en::FilePath().fake_with_rng(&mut self.rng);
        let status = self.generate_test_case_status();
        let duration = self.fake_duration(self.options.test_case.test_case_duration_range.clone());
        let time = format_seconds(duration);

        let mut test_case = BytesStart::new("testcase");
        test_case.push_attribute(("name", name.as_str()));
        test_case.push_attribute(("classname", classname.as_str()));
        test_case.push_attribute(("file", file.as_str()));
        test_case.push_attribute(("time", time.as_str()));
        writer.write_event(Event::Start(test_case))?;

        match status {
            MockStatus::Passed => (),
            MockStatus::Skipped => {
                let message = self.fake_sentence();
                let mut skipped = BytesStart::new("skipped");
                skipped.push_attribute(("message", message.as_str()));
                writer.write_event(Event::Empty(skipped))?;
            }
            MockStatus::Failed => {
                self.write_text_element(writer, "failure", Some("AssertionError"))?;
            }
            MockStatus::Error => {
                self.write_text_element(writer, "error", Some("RuntimeError"))?;
            }
        };

        if self.rand_bool(self.options.test_case.test_case_sys_out_percentage) {
            self.write_text_element(writer, "system-out", None)?;
        }
        if self.rand_bool(self.options.test_case.test_case_sys_err_percentage) {
            self.write_text_element(writer, "system-err", None)?;
        }

        writer.write_event(Event::End(BytesEnd::new("testcase")))?;
        Ok((status, duration))
    }

    /// Writes an element holding free-form text, sometimes split between
    /// escaped text and CDATA sections.
    fn write_text_element<W: Write>(
        &mut self,
        writer: &mut Writer<W>,
        tag: &str,
        r#type: Option<&str>,
    ) -> Result<()> {
        let mut element = BytesStart::new(tag);
        if let Some(r#type) = r#type {
            let message = self.fake_sentence();
            element.push_attribute(("message", message.as_str()));
            element.push_attribute(("type", r#type));
        }
        writer.write_event(Event::Start(element))?;

        let escaped = format!("{} <expected> & \"actual\"", self.fake_sentence());
        writer.write_event(Event::Text(BytesText::new(&escaped)))?;
        if self.rand_bool(self.options.document.cdata_percentage) {
            let verbatim = format!("{} &lt;not an entity&gt;", self.fake_paragraphs());
            writer.write_event(Event::CData(BytesCData::new(verbatim)))?;
            let trailing = self.fake_sentence();
            writer.write_event(Event::Text(BytesText::new(&trailing)))?;
        }

        writer.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn generate_test_case_status(&mut self) -> MockStatus {
        let rand_percentage = self.rand_percentage();
        let mut total = 0_u8;
        for (i, percentage) in self
            .options
            .test_case
            .test_case_success_to_skip_to_fail_to_error_percentage
            .iter()
            .flatten()
            .enumerate()
        {
            let new_total = total + percentage;
            if (total..=new_total).contains(&rand_percentage) {
                return match i {
                    1 => MockStatus::Skipped,
                    2 => MockStatus::Failed,
                    3 => MockStatus::Error,
                    _ => MockStatus::Passed,
                };
            }
            total = new_total;
        }
        MockStatus::Passed
    }

    fn fake_sentence(&mut self) -> String {
        let sentences: Vec<String> =
            fake::faker::lorem::en::Sentences(1..2).fake_with_rng(&mut self.rng);
        sentences.join(" ")
    }

    fn fake_paragraphs(&mut self) -> String {
        let paragraphs: Vec<String> =
            fake::faker::lorem::en::Paragraphs(1..3).fake_with_rng(&mut self.rng);
        paragraphs.join("\n")
    }

    fn fake_duration<T: AsRef<[humantime::Duration]>>(&mut self, range: T) -> Duration {
        let micros = |index: usize| {
            range
                .as_ref()
                .get(index)
                .or_else(|| range.as_ref().first())
                .map(|d| d.as_micros() as u64)
                .unwrap_or_default()
        };
        let (range_start, range_end) = (micros(0), micros(1));
        Duration::from_micros(self.rng.gen_range(range_start..=range_end.max(range_start)))
    }

    fn rand_in_range(&mut self, range: &[usize]) -> usize {
        let range_start = range.first().copied().unwrap_or_default();
        let range_end = range.get(1).copied().unwrap_or(range_start);
        self.rng.gen_range(range_start..=range_end.max(range_start))
    }

    fn rand_bool<T: Into<f64>>(&mut self, percentage_chance: T) -> bool {
        self.rng.gen_bool(percentage_chance.into() / 100.0)
    }

    fn rand_percentage(&mut self) -> u8 {
        self.rng.gen_range(0..=100)
    }
}

/// Renders a duration as decimal seconds with microsecond precision, grouping
/// thousands of seconds with commas the way some runners do.
pub fn format_seconds(duration: Duration) -> String {
    let secs = duration.as_secs().to_string();
    let mut grouped = String::with_capacity(secs.len() + secs.len() / 3);
    for (i, digit) in secs.chars().enumerate() {
        if i > 0 && (secs.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{}.{:06}", grouped, duration.subsec_micros())
}

#[test]
fn format_seconds_groups_thousands() {
    assert_eq!(format_seconds(Duration::from_micros(1_500)), "0.001500");
    assert_eq!(format_seconds(Duration::from_millis(999_250)), "999.250000");
    assert_eq!(
        format_seconds(Duration::from_micros(1_234_560_000)),
        "1,234.560000"
    );
}
