use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde_json::Value;

use crate::packages;

pub const ENTRY_PIPELINE: &str = "default";
const PIPELINE_DIR: &str = "elasticsearch/ingest_pipeline";

/// A pipeline definition ready to be installed under `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDefinition {
    pub name: String,
    pub id: String,
    pub body: Value,
}

fn pipeline_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\{\{\s*IngestPipeline\s+"([^"]+)"\s*\}\}"#).expect("valid pipeline ref regex")
    })
}

/// Id under which a pipeline is installed: `<type>-<package>.<data stream>-<version>-<name>-<nonce>`.
pub fn pipeline_id(prefix: &str, name: &str, nonce: u64) -> String {
    format!("{}-{}-{}", prefix, name, nonce)
}

/// Load the ingest pipelines of a data stream, rewriting references between
/// them to their installed ids. The nonce keeps ids unique per run.
pub fn load_pipelines(data_stream_root: &Path, nonce: u64) -> Result<Vec<PipelineDefinition>> {
    let package_root = data_stream_root
        .parent()
        .and_then(|p| p.parent())
        .context("data stream root has no package")?;
    let package = packages::read_package_manifest(package_root)?;
    let data_stream = packages::read_data_stream_manifest(data_stream_root)?;
    let data_stream_name = data_stream_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("data stream root has no name")?;
    let prefix = format!(
        "{}-{}.{}-{}",
        data_stream.kind, package.name, data_stream_name, package.version
    );

    let dir = data_stream_root.join(PIPELINE_DIR);
    let mut files: Vec<_> = fs::read_dir(&dir)
        .with_context(|| format!("reading ingest pipelines failed (path: {})", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml" | "yaml" | "json")
            )
        })
        .collect();
    files.sort();

    let mut definitions = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .context("pipeline file has no name")?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading pipeline failed (path: {})", path.display()))?;
        let rendered = pipeline_ref_pattern().replace_all(&raw, |caps: &regex::Captures| {
            pipeline_id(&prefix, &caps[1], nonce)
        });
        let body: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&rendered)
                .with_context(|| format!("parsing pipeline failed (path: {})", path.display()))?,
            _ => serde_yaml::from_str(&rendered)
                .with_context(|| format!("parsing pipeline failed (path: {})", path.display()))?,
        };
        definitions.push(PipelineDefinition {
            id: pipeline_id(&prefix, &name, nonce),
            name,
            body,
        });
    }

    if !definitions.iter().any(|d| d.name == ENTRY_PIPELINE) {
        bail!(
            "entry pipeline \"{}\" not found (path: {})",
            ENTRY_PIPELINE,
            dir.display()
        );
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn references_are_rewritten_to_installed_ids() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("manifest.yml"), "name: nginx\nversion: 1.2.0\n");
        let ds = tmp.path().join("data_stream/access");
        write(&ds.join("manifest.yml"), "type: logs\n");
        write(
            &ds.join("elasticsearch/ingest_pipeline/default.yml"),
            "processors:\n  - pipeline:\n      name: '{{ IngestPipeline \"third_party\" }}'\n",
        );
        write(
            &ds.join("elasticsearch/ingest_pipeline/third_party.json"),
            r#"{"processors": []}"#,
        );

        let defs = load_pipelines(&ds, 7).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].id, "logs-nginx.access-1.2.0-default-7");
        assert_eq!(
            defs[0].body["processors"][0]["pipeline"]["name"],
            "logs-nginx.access-1.2.0-third_party-7"
        );
        assert_eq!(defs[1].name, "third_party");
    }

    #[test]
    fn missing_entry_pipeline_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("manifest.yml"), "name: nginx\nversion: 1.2.0\n");
        let ds = tmp.path().join("data_stream/access");
        write(&ds.join("manifest.yml"), "type: logs\n");
        write(
            &ds.join("elasticsearch/ingest_pipeline/other.yml"),
            "processors: []\n",
        );

        let err = load_pipelines(&ds, 1).unwrap_err();
        assert!(err.to_string().contains("entry pipeline"));
    }
}
