pub mod human;
pub mod xunit;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};

use crate::models::{TestResult, TestType};

/// Tag naming a report format (e.g. "xUnit").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportFormat(String);

impl ReportFormat {
    pub const XUNIT: &'static str = "xUnit";
    pub const HUMAN: &'static str = "human";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn file_extension(&self) -> &'static str {
        if self.0 == Self::XUNIT { "xml" } else { "txt" }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a run's results into report text. An error means the report could
/// not be produced, not that tests failed.
pub type ReportFn = fn(&[TestResult]) -> Result<String>;

/// Report formatters keyed by format tag.
#[derive(Debug, Clone, Default)]
pub struct ReporterRegistry {
    reporters: HashMap<ReportFormat, ReportFn>,
}

impl ReporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ReportFormat::new(ReportFormat::XUNIT), xunit::report);
        registry.register(ReportFormat::new(ReportFormat::HUMAN), human::report);
        registry
    }

    /// Register a formatter. Registering a format again replaces the previous one.
    pub fn register(&mut self, format: ReportFormat, reporter: ReportFn) {
        self.reporters.insert(format, reporter);
    }

    pub fn lookup(&self, format: &ReportFormat) -> Option<ReportFn> {
        self.reporters.get(format).copied()
    }

    pub fn formats(&self) -> Vec<ReportFormat> {
        let mut formats: Vec<_> = self.reporters.keys().cloned().collect();
        formats.sort();
        formats
    }

    pub fn report(&self, format: &ReportFormat, results: &[TestResult]) -> Result<String> {
        let reporter = self
            .lookup(format)
            .ok_or_else(|| anyhow!("unsupported report format: {}", format))?;
        reporter(results)
    }
}

/// Destination of a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutput {
    Stdout,
    File,
}

impl FromStr for ReportOutput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdout" => Ok(ReportOutput::Stdout),
            "file" => Ok(ReportOutput::File),
            other => bail!("unsupported report output: {}", other),
        }
    }
}

/// Print the report, or write it under `dir` as
/// `<test types>_<unix millis>.<ext>`. Returns the file written, if any.
pub fn write_report(
    report: &str,
    output: ReportOutput,
    dir: &Path,
    format: &ReportFormat,
    test_types: &[TestType],
) -> Result<Option<PathBuf>> {
    match output {
        ReportOutput::Stdout => {
            println!("{}", report);
            Ok(None)
        }
        ReportOutput::File => {
            fs::create_dir_all(dir).with_context(|| {
                format!("creating report directory failed (path: {})", dir.display())
            })?;
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default();
            let prefix = test_types
                .iter()
                .map(TestType::as_str)
                .collect::<Vec<_>>()
                .join("-");
            let path = dir.join(format!(
                "{}_{}.{}",
                prefix,
                millis,
                format.file_extension()
            ));
            fs::write(&path, report)
                .with_context(|| format!("writing report failed (path: {})", path.display()))?;
            Ok(Some(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(_: &[TestResult]) -> Result<String> {
        Ok("constant".to_string())
    }

    #[test]
    fn defaults_cover_both_formats() {
        let registry = ReporterRegistry::with_defaults();
        assert_eq!(
            registry.formats(),
            vec![ReportFormat::new("human"), ReportFormat::new("xUnit")]
        );
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = ReporterRegistry::with_defaults();
        let format = ReportFormat::new(ReportFormat::HUMAN);
        registry.register(format.clone(), constant);
        assert_eq!(registry.report(&format, &[]).unwrap(), "constant");
    }

    #[test]
    fn unknown_format_is_an_error() {
        let registry = ReporterRegistry::with_defaults();
        let err = registry.report(&ReportFormat::new("tap"), &[]).unwrap_err();
        assert_eq!(err.to_string(), "unsupported report format: tap");
    }

    #[test]
    fn report_output_parses() {
        assert_eq!("file".parse::<ReportOutput>().unwrap(), ReportOutput::File);
        assert!("email".parse::<ReportOutput>().is_err());
    }

    #[test]
    fn file_report_is_written_to_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("reports");
        let path = write_report(
            "<testsuites></testsuites>",
            ReportOutput::File,
            &dir,
            &ReportFormat::new(ReportFormat::XUNIT),
            &[TestType::pipeline()],
        )
        .unwrap()
        .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pipeline_"));
        assert!(name.ends_with(".xml"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<testsuites></testsuites>");
    }
}
