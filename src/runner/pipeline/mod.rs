pub mod golden;
pub mod test_case;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::engine::IngestClient;
use crate::models::{TestResult, TestType};
use crate::packages;

use super::{RunError, RunFailure, RunResult, TestOptions, TestRunner};
use golden::{EXPECTED_SUFFIX, VerifyError};
use test_case::CONFIG_SUFFIX;

/// Runs ingest pipeline tests: each case file is simulated against the data
/// stream's pipelines and checked against its golden file.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineRunner;

impl PipelineRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Guard that uninstalls provisioned pipelines.
///
/// `release` is the normal path. If the run future is dropped before that
/// (task aborted, panic), the uninstall is spawned on the current runtime.
struct PipelineGuard {
    client: Arc<dyn IngestClient>,
    ids: Vec<String>,
    released: bool,
}

impl PipelineGuard {
    fn new(client: Arc<dyn IngestClient>, ids: Vec<String>) -> Self {
        Self {
            client,
            ids,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        debug!(pipelines = ?self.ids, "uninstalling ingest pipelines");
        if let Err(e) = self.client.uninstall_pipelines(&self.ids).await {
            warn!("uninstalling ingest pipelines failed: {:#}", e);
        }
    }
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let ids = std::mem::take(&mut self.ids);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(pipelines = ?ids, "ingest pipelines left installed: no runtime for teardown");
            return;
        };
        let client = Arc::clone(&self.client);
        handle.spawn(async move {
            if let Err(e) = client.uninstall_pipelines(&ids).await {
                warn!("uninstalling ingest pipelines failed: {:#}", e);
            }
        });
    }
}

/// Candidate case files in `dir`, sorted by name. Golden files and sidecar
/// configs are not cases.
fn list_test_case_files(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("reading pipeline tests failed (path: {})", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("reading pipeline tests failed (path: {})", dir.display()))?;
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(EXPECTED_SUFFIX) || name.ends_with(CONFIG_SUFFIX) {
            continue;
        }
        files.push(name);
    }
    files.sort();
    Ok(files)
}

impl PipelineRunner {
    async fn run_cases(&self, options: &TestOptions, files: &[String], entry: &str) -> RunResult {
        let folder = &options.test_folder;
        let mut results: Vec<TestResult> = Vec::with_capacity(files.len());
        let mut failed = 0;

        for file in files {
            let path = folder.path.join(file);
            let mut tr = TestResult::new(self.test_type(), &folder.package, &folder.data_stream);
            tr.name = test_case::case_name(file);
            let started = Instant::now();

            let tc = match test_case::load(&path).context("loading test case failed") {
                Ok(tc) => tc,
                Err(e) => return Err(abort(results, tr, e)),
            };
            info!("Test case: {}", tc.name);

            let observed = match options
                .client
                .simulate(entry, &tc.events)
                .await
                .context("simulating pipeline processing failed")
            {
                Ok(observed) => observed,
                Err(e) => return Err(abort(results, tr, e)),
            };
            tr.time_elapsed = started.elapsed();

            match golden::verify(&path, &observed, options.generate_expected) {
                Ok(()) => {}
                Err(VerifyError::Other(e)) => {
                    return Err(abort(results, tr, e.context("verifying test result failed")));
                }
                Err(mismatch) => {
                    debug!(case = %tr.name, "test case output differs");
                    failed += 1;
                    tr.failure_msg = mismatch.to_string();
                    tr.failure_details = mismatch.details().to_string();
                }
            }
            results.push(tr);
        }

        if failed > 0 {
            let total = results.len();
            return Err(RunFailure {
                results,
                error: RunError::CasesFailed { failed, total },
            });
        }
        Ok(results)
    }
}

/// Record `error` on the case that hit it and end the run.
fn abort(mut results: Vec<TestResult>, mut tr: TestResult, error: anyhow::Error) -> RunFailure {
    tr.error_msg = format!("{:#}", error);
    results.push(tr);
    RunFailure::aborted(results, error)
}

#[async_trait]
impl TestRunner for PipelineRunner {
    async fn run(&self, options: &TestOptions) -> RunResult {
        let folder = &options.test_folder;

        let files = list_test_case_files(&folder.path)
            .context("listing test case definitions failed")
            .map_err(|e| RunFailure::aborted(Vec::new(), e))?;

        let data_stream_root = match packages::find_data_stream_root(&folder.path) {
            Ok(Some(root)) => root,
            Ok(None) => {
                return Err(RunFailure::aborted(
                    Vec::new(),
                    anyhow!("data stream root not found"),
                ));
            }
            Err(e) => {
                return Err(RunFailure::aborted(
                    Vec::new(),
                    e.context("locating data_stream root failed"),
                ));
            }
        };

        let installed = options
            .client
            .install_pipelines(&data_stream_root)
            .await
            .context("installing ingest pipelines failed")
            .map_err(|e| RunFailure::aborted(Vec::new(), e))?;
        debug!(entry = %installed.entry, pipelines = ?installed.ids, "installed ingest pipelines");

        let guard = PipelineGuard::new(Arc::clone(&options.client), installed.ids);
        let outcome = self.run_cases(options, &files, &installed.entry).await;
        guard.release().await;
        outcome
    }

    fn test_type(&self) -> TestType {
        TestType::pipeline()
    }
}
