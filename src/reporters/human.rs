use std::fmt::Write;

use anyhow::{Context, Result};

use crate::models::{RunSummary, TestResult, TestStatus};

/// One line per case in run order, details indented below failed ones,
/// and a summary line.
pub fn report(results: &[TestResult]) -> Result<String> {
    if results.is_empty() {
        return Ok("No test results".to_string());
    }
    render(results).context("unable to format test results as text")
}

fn render(results: &[TestResult]) -> Result<String> {
    let mut out = String::new();
    for r in results {
        let status = r.status();
        writeln!(
            out,
            "{} {}/{} {} {} {} ({} ms)",
            status.icon(),
            r.package,
            r.data_stream,
            r.test_type,
            r.name,
            status.label(),
            r.time_elapsed.as_millis()
        )?;

        let detail = match status {
            TestStatus::Errored => r.error_msg.clone(),
            TestStatus::Failed => r.failure_text(),
            TestStatus::Passed => continue,
        };
        for line in detail.lines() {
            writeln!(out, "    {}", line)?;
        }
    }

    let summary = RunSummary::from_results(results);
    write!(
        out,
        "{} tests: {} passed, {} failed, {} errored",
        summary.total, summary.passed, summary.failed, summary.errored
    )?;
    Ok(out)
}
