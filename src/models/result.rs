use std::fmt;
use std::time::Duration;

use super::status::TestStatus;

/// Tag identifying the runner that produced a result (e.g. "pipeline").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestType(String);

impl TestType {
    pub const PIPELINE: &'static str = "pipeline";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn pipeline() -> Self {
        Self::new(Self::PIPELINE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single test case.
///
/// `error_msg` is set when the case could not be executed at all,
/// `failure_msg` when it ran but its output did not match the golden file.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub test_type: TestType,
    pub package: String,
    pub data_stream: String,
    pub name: String,
    pub time_elapsed: Duration,
    pub error_msg: String,
    pub failure_msg: String,
    pub failure_details: String,
}

impl TestResult {
    pub fn new(test_type: TestType, package: &str, data_stream: &str) -> Self {
        Self {
            test_type,
            package: package.to_string(),
            data_stream: data_stream.to_string(),
            name: String::new(),
            time_elapsed: Duration::ZERO,
            error_msg: String::new(),
            failure_msg: String::new(),
            failure_details: String::new(),
        }
    }

    pub fn status(&self) -> TestStatus {
        if !self.error_msg.is_empty() {
            TestStatus::Errored
        } else if !self.failure_msg.is_empty() {
            TestStatus::Failed
        } else {
            TestStatus::Passed
        }
    }

    /// Failure message with details appended, as shown in reports.
    pub fn failure_text(&self) -> String {
        let mut failure = self.failure_msg.clone();
        if !self.failure_details.is_empty() {
            failure.push_str(": ");
            failure.push_str(&self.failure_details);
        }
        failure
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl RunSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.total += 1;
            match result.status() {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Errored => summary.errored += 1,
            }
        }
        summary
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}
