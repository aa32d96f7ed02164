use crate::{
    content::{extract_content, ContentError},
    node::XmlNode,
    report::{NonSuccessKind, Properties, Suite, Test, TestError},
};

const TAG_TEST_SUITE: &str = "testsuite";
const TAG_TEST_CASE: &str = "testcase";
const TAG_TEST_CASE_STATUS_SKIPPED: &str = "skipped";
const TAG_TEST_CASE_STATUS_FAILURE: &str = "failure";
const TAG_TEST_CASE_STATUS_ERROR: &str = "error";
const TAG_PROPERTIES: &str = "properties";
const TAG_PROPERTY: &str = "property";
const TAG_SYSTEM_OUT: &str = "system-out";
const TAG_SYSTEM_ERR: &str = "system-err";

pub mod junit_attrs {
    pub const NAME: &str = "name";
    pub const PACKAGE: &str = "package";
    pub const CLASSNAME: &str = "classname";
    pub const TIME: &str = "time";
    pub const DURATION: &str = "duration";
    pub const MESSAGE: &str = "message";
    pub const TYPE: &str = "type";
    pub const VALUE: &str = "value";
}

/// Builds suites from decoded nodes, in document order.
///
/// Top-level nodes that are not suites (such as a `testsuites` wrapper) are
/// searched for suites. The returned suites are not aggregated.
pub fn map_suites(nodes: Vec<XmlNode>) -> Result<Vec<Suite>, ContentError> {
    let mut suites = Vec::new();
    find_suites(nodes, &mut suites)?;
    Ok(suites)
}

fn find_suites(nodes: Vec<XmlNode>, suites: &mut Vec<Suite>) -> Result<(), ContentError> {
    for node in nodes {
        if node.name == TAG_TEST_SUITE {
            suites.push(map_suite(node)?);
        } else {
            find_suites(node.children, suites)?;
        }
    }
    Ok(())
}

fn map_suite(XmlNode { attrs, children, .. }: XmlNode) -> Result<Suite, ContentError> {
    let mut suite = Suite::default();

    for (key, value) in attrs {
        match key.as_str() {
            junit_attrs::NAME => suite.name = value,
            junit_attrs::PACKAGE => suite.package = value,
            _ => {
                suite.properties.insert(key, value);
            }
        }
    }

    // declared properties are applied after attributes so they win collisions
    for child in children {
        match child.name.as_str() {
            TAG_TEST_SUITE => suite.add_suite(map_suite(child)?),
            TAG_TEST_CASE => suite.add_test(map_test(child)?),
            TAG_PROPERTIES => suite.properties.extend(map_properties(child)?),
            TAG_SYSTEM_OUT => suite.system_out = extract_content(&child.content)?,
            TAG_SYSTEM_ERR => suite.system_err = extract_content(&child.content)?,
            tag => tracing::trace!(tag, suite = %suite.name, "ignoring unknown test suite child"),
        }
    }

    Ok(suite)
}

fn map_test(XmlNode { attrs, children, .. }: XmlNode) -> Result<Test, ContentError> {
    let mut test = Test::default();

    let mut time = None;
    let mut duration_alias = None;
    for (key, value) in attrs {
        match key.as_str() {
            junit_attrs::NAME => test.name = value,
            junit_attrs::CLASSNAME => test.classname = value,
            junit_attrs::TIME => time = Some(value),
            junit_attrs::DURATION => duration_alias = Some(value),
            _ => {
                test.properties.insert(key, value);
            }
        }
    }
    if let Some(value) = time.or(duration_alias) {
        test.duration = parse_attr::duration(&value);
    }

    let mut skipped = None;
    let mut failure = None;
    let mut error = None;
    for child in children {
        match child.name.as_str() {
            TAG_TEST_CASE_STATUS_SKIPPED => {
                skipped.get_or_insert(child);
            }
            TAG_TEST_CASE_STATUS_FAILURE => {
                failure.get_or_insert(child);
            }
            TAG_TEST_CASE_STATUS_ERROR => {
                error.get_or_insert(child);
            }
            TAG_SYSTEM_OUT => test.system_out = extract_content(&child.content)?,
            TAG_SYSTEM_ERR => test.system_err = extract_content(&child.content)?,
            tag => tracing::trace!(tag, test = %test.name, "ignoring unknown test case child"),
        }
    }

    if let Some(skipped) = skipped {
        test.skip(skipped.attr(junit_attrs::MESSAGE).unwrap_or_default());
    } else if let Some(failure) = failure {
        test.fail(map_test_error(NonSuccessKind::Failure, failure)?);
    } else if let Some(error) = error {
        test.fail(map_test_error(NonSuccessKind::Error, error)?);
    }

    Ok(test)
}

fn map_test_error(kind: NonSuccessKind, node: XmlNode) -> Result<TestError, ContentError> {
    let mut test_error = TestError::new(kind);
    test_error.body = extract_content(&node.content)?;
    let XmlNode { mut attrs, .. } = node;
    test_error.message = attrs.swap_remove(junit_attrs::MESSAGE).unwrap_or_default();
    test_error.r#type = attrs.swap_remove(junit_attrs::TYPE).unwrap_or_default();
    Ok(test_error)
}

fn map_properties(node: XmlNode) -> Result<Properties, ContentError> {
    let mut properties = Properties::new();
    for child in node.children {
        if child.name != TAG_PROPERTY {
            tracing::trace!(tag = %child.name, "ignoring unknown properties child");
            continue;
        }
        let Some(name) = child.attr(junit_attrs::NAME).map(String::from) else {
            tracing::trace!("ignoring property without a name");
            continue;
        };
        let value = match child.attr(junit_attrs::VALUE) {
            Some(value) => value.to_string(),
            None => extract_content(&child.content)?,
        };
        properties.insert(name, value);
    }
    Ok(properties)
}

mod parse_attr {
    use std::time::Duration;

    const MICROS_PER_SEC: f64 = 1_000_000.0;

    /// Parses decimal seconds, ignoring grouping commas (`"1,234.56"`), to the
    /// nearest microsecond. Anything unparsable is a zero duration.
    pub fn duration<T: AsRef<str>>(value: T) -> Duration {
        let value = value.as_ref();
        let seconds = value.trim().replace(',', "").parse::<f64>().ok();
        match seconds.map(|seconds| (seconds * MICROS_PER_SEC).round()) {
            Some(micros) if micros.is_finite() && micros >= 0.0 && micros <= u64::MAX as f64 => {
                Duration::from_micros(micros as u64)
            }
            _ => {
                tracing::warn!(value, "could not parse test case duration, using zero");
                Duration::ZERO
            }
        }
    }

}
