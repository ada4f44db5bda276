use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::pipelines::{ENTRY_PIPELINE, load_pipelines};
use super::{IngestClient, InstalledPipelines};
use crate::config::EngineConfig;

/// Ingest client speaking the Elasticsearch REST API.
///
/// Requests are blocking and run on tokio's blocking pool.
#[derive(Clone)]
pub struct HttpIngestClient {
    inner: Arc<Inner>,
}

struct Inner {
    agent: ureq::Agent,
    base_url: String,
    authorization: Option<String>,
}

impl std::fmt::Debug for HttpIngestClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpIngestClient")
            .field("base_url", &self.inner.base_url)
            .finish()
    }
}

impl HttpIngestClient {
    pub fn new(config: &EngineConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        let authorization = config.username.as_ref().map(|user| {
            let password = config.password.as_deref().unwrap_or_default();
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", user, password));
            format!("Basic {}", token)
        });
        Self {
            inner: Arc::new(Inner {
                agent,
                base_url: config.url.trim_end_matches('/').to_string(),
                authorization,
            }),
        }
    }

    /// Run a blocking request on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .context("ingest request task failed")?
    }
}

impl Inner {
    fn request(&self, method: &str, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "ingest request");

        let mut request = self
            .agent
            .request(method, &url)
            .set("Content-Type", "application/json");
        if let Some(ref auth) = self.authorization {
            request = request.set("Authorization", auth);
        }

        let response = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };

        match response {
            Ok(response) => response
                .into_json::<Value>()
                .with_context(|| format!("failed to decode response of {} {}", method, url)),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(anyhow!(
                    "unexpected response status for {} {}: {} ({})",
                    method,
                    url,
                    code,
                    body.trim()
                ))
            }
            Err(e) => Err(e).with_context(|| format!("{} {} failed", method, url)),
        }
    }
}

fn run_nonce() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Extract processed documents from a `_simulate` response.
fn simulated_documents(response: &Value) -> Result<Vec<Value>> {
    let docs = response["docs"]
        .as_array()
        .context("simulate response missing 'docs' field")?;

    Ok(docs
        .iter()
        .map(|doc| match doc.get("error") {
            Some(error) => json!({ "error": error }),
            None => doc["doc"]["_source"].clone(),
        })
        .collect())
}

#[async_trait]
impl IngestClient for HttpIngestClient {
    async fn install_pipelines(&self, data_stream_root: &Path) -> Result<InstalledPipelines> {
        let definitions = load_pipelines(data_stream_root, run_nonce())?;
        let entry = definitions
            .iter()
            .find(|d| d.name == ENTRY_PIPELINE)
            .map(|d| d.id.clone())
            .context("entry pipeline not loaded")?;

        let mut ids: Vec<String> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let id = definition.id.clone();
            let path = format!("/_ingest/pipeline/{}", id);
            let installed = self
                .blocking(move |inner| inner.request("PUT", &path, Some(&definition.body)))
                .await
                .with_context(|| format!("installing pipeline {} failed", id));
            if let Err(e) = installed {
                // Pipelines already put are not tracked by the caller.
                if !ids.is_empty() {
                    if let Err(cleanup) = self.uninstall_pipelines(&ids).await {
                        warn!("removing partially installed pipelines failed: {:#}", cleanup);
                    }
                }
                return Err(e);
            }
            ids.push(id);
        }

        Ok(InstalledPipelines { entry, ids })
    }

    async fn uninstall_pipelines(&self, ids: &[String]) -> Result<()> {
        for id in ids {
            let path = format!("/_ingest/pipeline/{}", id);
            self.blocking(move |inner| inner.request("DELETE", &path, None))
                .await
                .with_context(|| format!("deleting pipeline {} failed", id))?;
        }
        Ok(())
    }

    async fn simulate(&self, pipeline: &str, events: &[Value]) -> Result<Vec<Value>> {
        let path = format!("/_ingest/pipeline/{}/_simulate", pipeline);
        let docs: Vec<Value> = events.iter().map(|e| json!({ "_source": e })).collect();
        let body = json!({ "docs": docs });

        let response = self
            .blocking(move |inner| inner.request("POST", &path, Some(&body)))
            .await?;
        simulated_documents(&response)
    }
}
