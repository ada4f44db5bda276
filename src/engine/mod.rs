pub mod http;
pub mod pipelines;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpIngestClient;

/// Pipelines provisioned on the engine for one test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPipelines {
    /// Pipeline the simulate calls run against.
    pub entry: String,
    pub ids: Vec<String>,
}

/// Client for the remote ingest engine.
#[async_trait]
pub trait IngestClient: Send + Sync {
    /// Install every pipeline definition found under a data stream root.
    async fn install_pipelines(&self, data_stream_root: &Path) -> Result<InstalledPipelines>;

    /// Delete the given pipelines.
    async fn uninstall_pipelines(&self, ids: &[String]) -> Result<()>;

    /// Run `events` through `pipeline` without indexing them and return the
    /// processed documents in input order.
    async fn simulate(&self, pipeline: &str, events: &[Value]) -> Result<Vec<Value>>;
}
