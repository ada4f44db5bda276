use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_FILE: &str = "pipetest.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Connection settings for the ingest engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_engine_url() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Where and how the final report is written.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_format")]
    pub format: String,
    /// "stdout" or "file".
    #[serde(default = "default_report_output")]
    pub output: String,
    /// Directory for file reports.
    #[serde(default = "default_report_dir")]
    pub dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_report_format(),
            output: default_report_output(),
            dir: default_report_dir(),
        }
    }
}

fn default_report_format() -> String {
    "human".to_string()
}

fn default_report_output() -> String {
    "stdout".to_string()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("build/test-results")
}

impl Config {
    /// Load `pipetest.toml` from `dir`, falling back to defaults if absent or invalid,
    /// then apply `PIPETEST_ENGINE_*` environment overrides.
    pub fn load(dir: &Path) -> Self {
        let mut config = Self::from_file(&dir.join(CONFIG_FILE));
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn from_file(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring invalid {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("PIPETEST_ENGINE_URL") {
            self.engine.url = url;
        }
        if let Some(username) = var("PIPETEST_ENGINE_USERNAME") {
            self.engine.username = Some(username);
        }
        if let Some(password) = var("PIPETEST_ENGINE_PASSWORD") {
            self.engine.password = Some(password);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::from_file(&tmp.path().join(CONFIG_FILE));
        assert_eq!(config.engine.url, "http://127.0.0.1:9200");
        assert_eq!(config.report.format, "human");
        assert_eq!(config.report.output, "stdout");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[engine]\nurl = \"https://es:9200\"\nusername = \"elastic\"\n\n[report]\nformat = \"xUnit\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path);
        assert_eq!(config.engine.url, "https://es:9200");
        assert_eq!(config.engine.username.as_deref(), Some("elastic"));
        assert_eq!(config.engine.timeout_secs, 60);
        assert_eq!(config.report.format, "xUnit");
        assert_eq!(config.report.dir, PathBuf::from("build/test-results"));
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "engine = [").unwrap();
        assert_eq!(Config::from_file(&path).engine.url, "http://127.0.0.1:9200");
    }

    #[test]
    fn env_overrides_engine_settings() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "PIPETEST_ENGINE_URL" => Some("http://other:9200".into()),
            "PIPETEST_ENGINE_PASSWORD" => Some("secret".into()),
            _ => None,
        });
        assert_eq!(config.engine.url, "http://other:9200");
        assert_eq!(config.engine.username, None);
        assert_eq!(config.engine.password.as_deref(), Some("secret"));
    }
}
