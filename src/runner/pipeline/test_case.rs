use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const CONFIG_SUFFIX: &str = "-config.yml";

/// Input events for one simulate call.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub name: String,
    pub events: Vec<Value>,
}

/// Sidecar settings for raw `.log` inputs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestCaseConfig {
    pub multiline: Option<Multiline>,
    /// Extra fields merged into every event.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Multiline {
    pub first_line_pattern: String,
}

#[derive(Debug, Deserialize)]
struct EventsFile {
    events: Vec<Value>,
}

/// Case name derived from its file name, without the extension.
pub fn case_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}

/// Load a test case file; the extension selects the input shape.
pub fn load(path: &Path) -> Result<TestCase> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("test case path has no file name")?;
    let name = case_name(&file_name);

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading input file failed (path: {})", path.display()))?;

    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    match ext.as_str() {
        ".json" => for_events(name, &data).with_context(|| {
            format!("creating test case for events failed (path: {})", path.display())
        }),
        ".log" => {
            let config = read_config(path).with_context(|| {
                format!("reading config for test case failed (path: {})", path.display())
            })?;
            for_raw_input(name, &data, &config).with_context(|| {
                format!("creating test case for raw input failed (path: {})", path.display())
            })
        }
        _ => bail!("unsupported extension for test case file (ext: {})", ext),
    }
}

fn for_events(name: String, data: &str) -> Result<TestCase> {
    let file: EventsFile = serde_json::from_str(data).context("unmarshalling events failed")?;
    if let Some(index) = file.events.iter().position(|e| !e.is_object()) {
        bail!("event {} is not a JSON object", index);
    }
    Ok(TestCase {
        name,
        events: file.events,
    })
}

/// Read `<case file>-config.yml`. Raw inputs cannot run without one.
fn read_config(case_path: &Path) -> Result<TestCaseConfig> {
    let mut config_path = case_path.as_os_str().to_owned();
    config_path.push(CONFIG_SUFFIX);
    let config_path = Path::new(&config_path);

    let data = fs::read_to_string(config_path)
        .with_context(|| format!("reading config failed (path: {})", config_path.display()))?;
    if data.trim().is_empty() {
        return Ok(TestCaseConfig::default());
    }
    serde_yaml::from_str(&data)
        .with_context(|| format!("parsing config failed (path: {})", config_path.display()))
}

fn for_raw_input(name: String, data: &str, config: &TestCaseConfig) -> Result<TestCase> {
    let entries = match &config.multiline {
        Some(multiline) => join_multiline(data, &multiline.first_line_pattern)?,
        None => data
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let events = entries
        .into_iter()
        .map(|message| {
            let mut event = config.fields.clone();
            event.insert("message".to_string(), Value::String(message));
            Value::Object(event)
        })
        .collect();

    Ok(TestCase { name, events })
}

/// Lines not matching the first-line pattern continue the previous entry.
fn join_multiline(data: &str, first_line_pattern: &str) -> Result<Vec<String>> {
    let first_line = Regex::new(first_line_pattern)
        .with_context(|| format!("invalid first_line_pattern: {}", first_line_pattern))?;

    let mut entries: Vec<String> = Vec::new();
    for line in data.lines().filter(|l| !l.is_empty()) {
        match entries.last_mut() {
            Some(last) if !first_line.is_match(line) => {
                last.push('\n');
                last.push_str(line);
            }
            _ => entries.push(line.to_string()),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_case_loads_events() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test-access.json");
        fs::write(&path, r#"{"events": [{"message": "a"}, {"message": "b"}]}"#).unwrap();

        let tc = load(&path).unwrap();
        assert_eq!(tc.name, "test-access");
        assert_eq!(tc.events, vec![json!({"message": "a"}), json!({"message": "b"})]);
    }

    #[test]
    fn json_case_rejects_non_object_events() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, r#"{"events": [{"message": "a"}, 3]}"#).unwrap();

        let err = load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("event 1 is not a JSON object"));
    }

    #[test]
    fn log_case_without_config_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test-error.log");
        fs::write(&path, "first\nsecond\n").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().starts_with("reading config for test case failed"));
    }

    #[test]
    fn log_case_with_empty_config_is_one_event_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test-error.log");
        fs::write(&path, "first\n\nsecond\n").unwrap();
        fs::write(tmp.path().join("test-error.log-config.yml"), "").unwrap();

        let tc = load(&path).unwrap();
        assert_eq!(
            tc.events,
            vec![json!({"message": "first"}), json!({"message": "second"})]
        );
    }

    #[test]
    fn log_case_joins_multiline_and_adds_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("test-trace.log");
        fs::write(
            &path,
            "2020-01-01 boom\n  at a\n  at b\n2020-01-02 ok\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("test-trace.log-config.yml"),
            "multiline:\n  first_line_pattern: '^\\d{4}-'\nfields:\n  service.name: api\n",
        )
        .unwrap();

        let tc = load(&path).unwrap();
        assert_eq!(
            tc.events,
            vec![
                json!({"message": "2020-01-01 boom\n  at a\n  at b", "service.name": "api"}),
                json!({"message": "2020-01-02 ok", "service.name": "api"}),
            ]
        );
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("case3.csv");
        fs::write(&path, "a,b\n").unwrap();

        let err = load(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported extension for test case file (ext: .csv)"
        );
    }

    #[test]
    fn case_name_strips_extension() {
        assert_eq!(case_name("case1.json"), "case1");
        assert_eq!(case_name("noext"), "noext");
    }
}
