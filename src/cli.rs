use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{HttpIngestClient, IngestClient};
use crate::models::{RunSummary, TestResult, TestType};
use crate::packages;
use crate::reporters::{self, ReportFormat, ReportOutput, ReporterRegistry};
use crate::runner::{RunError, RunnerRegistry, TestOptions};

#[derive(Debug, Parser)]
#[command(
    name = "pipetest",
    version,
    about = "Run ingest pipeline tests of a package against a live engine"
)]
pub struct Cli {
    /// Package directory; defaults to the package containing the current directory.
    #[arg(long)]
    pub package_root: Option<PathBuf>,

    /// Test types to run.
    #[arg(long = "test-type", default_value = TestType::PIPELINE)]
    pub test_types: Vec<String>,

    /// Only run tests of these data streams (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub data_streams: Vec<String>,

    /// Write observed results as the new expected results.
    #[arg(long)]
    pub generate: bool,

    /// Report format (xUnit, human).
    #[arg(long)]
    pub report_format: Option<String>,

    /// Report destination (stdout, file).
    #[arg(long)]
    pub report_output: Option<String>,

    /// Directory for file reports.
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Ingest engine URL.
    #[arg(long)]
    pub engine_url: Option<String>,
}

/// Settings for one invocation after merging config file and flags.
struct Settings {
    package_root: PathBuf,
    test_types: Vec<TestType>,
    report_format: ReportFormat,
    report_output: ReportOutput,
    report_dir: PathBuf,
}

fn resolve_settings(cli: &Cli, config: &Config, cwd: &Path) -> Result<Settings> {
    let package_root = match &cli.package_root {
        Some(root) => root.clone(),
        None => packages::find_package_root(cwd)?
            .context("no package found; run inside a package or pass --package-root")?,
    };
    let report_output = cli
        .report_output
        .as_deref()
        .unwrap_or(&config.report.output)
        .parse()?;

    Ok(Settings {
        package_root,
        test_types: cli.test_types.iter().map(TestType::new).collect(),
        report_format: ReportFormat::new(
            cli.report_format
                .clone()
                .unwrap_or_else(|| config.report.format.clone()),
        ),
        report_output,
        report_dir: cli
            .report_dir
            .clone()
            .unwrap_or_else(|| config.report.dir.clone()),
    })
}

/// Run the selected test types and write the report. Returns the summary of
/// a run that completed; an error if it could not.
pub async fn run(cli: Cli) -> Result<RunSummary> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let mut config = Config::load(&cwd);
    if let Some(url) = &cli.engine_url {
        config.engine.url = url.clone();
    }
    let settings = resolve_settings(&cli, &config, &cwd)?;

    let runners = RunnerRegistry::with_defaults();
    let reporters = ReporterRegistry::with_defaults();
    if reporters.lookup(&settings.report_format).is_none() {
        bail!("unsupported report format: {}", settings.report_format);
    }
    for test_type in &settings.test_types {
        if runners.lookup(test_type).is_none() {
            bail!("unsupported test type: {}", test_type);
        }
    }

    let client: Arc<dyn IngestClient> = Arc::new(HttpIngestClient::new(&config.engine));
    info!(engine = %config.engine.url, package = %settings.package_root.display(), "running tests");

    let mut results: Vec<TestResult> = Vec::new();
    let mut aborted = None;
    'types: for test_type in &settings.test_types {
        let folders =
            packages::find_test_folders(&settings.package_root, test_type, &cli.data_streams)
                .with_context(|| format!("looking up {} test folders failed", test_type))?;
        if folders.is_empty() {
            warn!("no {} tests found", test_type);
        }

        for folder in folders {
            info!("Running {} tests for {}/{}", test_type, folder.package, folder.data_stream);
            let options = TestOptions {
                test_folder: folder,
                client: Arc::clone(&client),
                generate_expected: cli.generate,
            };
            match runners.run(test_type, &options).await {
                Ok(r) => results.extend(r),
                Err(failure) => {
                    results.extend(failure.results);
                    match failure.error {
                        RunError::CasesFailed { failed, total } => {
                            warn!("{} of {} test cases failed", failed, total);
                        }
                        RunError::Aborted(e) => {
                            aborted = Some(e.context(format!("{} tests failed", test_type)));
                            break 'types;
                        }
                    }
                }
            }
        }
    }

    let report = reporters.report(&settings.report_format, &results)?;
    if let Some(path) = reporters::write_report(
        &report,
        settings.report_output,
        &settings.report_dir,
        &settings.report_format,
        &settings.test_types,
    )? {
        info!("report written to {}", path.display());
    }

    match aborted {
        Some(e) => Err(e.context("test run could not complete")),
        None => Ok(RunSummary::from_results(&results)),
    }
}
