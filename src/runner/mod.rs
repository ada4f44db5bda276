pub mod pipeline;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use thiserror::Error;

use crate::engine::IngestClient;
use crate::models::{TestResult, TestType};
pub use crate::packages::TestFolder;

/// Inputs for one runner invocation.
#[derive(Clone)]
pub struct TestOptions {
    pub test_folder: TestFolder,
    pub client: Arc<dyn IngestClient>,
    /// Overwrite golden files with the observed output instead of only comparing.
    pub generate_expected: bool,
}

/// Why a run did not end cleanly.
#[derive(Debug, Error)]
pub enum RunError {
    /// Every case ran, but some did not match their expected output.
    #[error("at least one test case failed ({failed} of {total})")]
    CasesFailed { failed: usize, total: usize },

    /// The run stopped before all cases were attempted.
    #[error(transparent)]
    Aborted(#[from] anyhow::Error),
}

/// A failed run together with the results gathered up to that point.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub results: Vec<TestResult>,
    #[source]
    pub error: RunError,
}

impl RunFailure {
    pub fn aborted(results: Vec<TestResult>, error: anyhow::Error) -> Self {
        Self {
            results,
            error: RunError::Aborted(error),
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.error, RunError::Aborted(_))
    }
}

pub type RunResult = std::result::Result<Vec<TestResult>, RunFailure>;

/// A test execution strategy for one test type.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Run every test case of `options.test_folder`.
    async fn run(&self, options: &TestOptions) -> RunResult;

    fn test_type(&self) -> TestType;
}

/// Runners keyed by the test type they execute.
#[derive(Clone, Default)]
pub struct RunnerRegistry {
    runners: HashMap<TestType, Arc<dyn TestRunner>>,
}

impl std::fmt::Debug for RunnerRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RunnerRegistry")
            .field("test_types", &self.test_types())
            .finish()
    }
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            TestType::pipeline(),
            Arc::new(pipeline::PipelineRunner::new()),
        );
        registry
    }

    /// Register a runner. Registering a test type again replaces the previous runner.
    pub fn register(&mut self, test_type: TestType, runner: Arc<dyn TestRunner>) {
        self.runners.insert(test_type, runner);
    }

    pub fn lookup(&self, test_type: &TestType) -> Option<Arc<dyn TestRunner>> {
        self.runners.get(test_type).map(Arc::clone)
    }

    pub fn test_types(&self) -> Vec<TestType> {
        let mut types: Vec<_> = self.runners.keys().cloned().collect();
        types.sort();
        types
    }

    /// Dispatch a run to the runner registered for `test_type`.
    pub async fn run(&self, test_type: &TestType, options: &TestOptions) -> RunResult {
        match self.lookup(test_type) {
            Some(runner) => runner.run(options).await,
            None => Err(RunFailure::aborted(
                Vec::new(),
                anyhow!("no runner registered for test type: {}", test_type),
            )),
        }
    }
}
