use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const EXPECTED_SUFFIX: &str = "-expected.json";

/// Outcome of checking observed output against a golden file.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Output differs from the golden file.
    #[error("test case failed")]
    Mismatch { details: String },

    /// The comparison itself could not be done.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VerifyError {
    /// What differed, for a mismatch; empty otherwise.
    pub fn details(&self) -> &str {
        match self {
            VerifyError::Mismatch { details } => details,
            VerifyError::Other(_) => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectedResult {
    pub expected: Vec<Value>,
}

/// `<case file>-expected.json`, next to the case file.
pub fn expected_path(case_path: &Path) -> PathBuf {
    let mut path = case_path.as_os_str().to_owned();
    path.push(EXPECTED_SUFFIX);
    PathBuf::from(path)
}

pub fn read_expected(case_path: &Path) -> anyhow::Result<ExpectedResult> {
    let path = expected_path(case_path);
    let data = fs::read_to_string(&path).with_context(|| {
        format!("reading expected test result failed (path: {})", path.display())
    })?;
    serde_json::from_str(&data).with_context(|| {
        format!("unmarshalling expected test result failed (path: {})", path.display())
    })
}

pub fn write_expected(case_path: &Path, observed: &[Value]) -> anyhow::Result<()> {
    let path = expected_path(case_path);
    let expected = ExpectedResult {
        expected: observed.to_vec(),
    };
    let mut data =
        serde_json::to_string_pretty(&expected).context("marshalling test result failed")?;
    data.push('\n');
    fs::write(&path, data)
        .with_context(|| format!("writing test result failed (path: {})", path.display()))
}

/// Structural comparison; details name the first difference.
pub fn compare(expected: &ExpectedResult, observed: &[Value]) -> Result<(), VerifyError> {
    if expected.expected.len() != observed.len() {
        return Err(VerifyError::Mismatch {
            details: format!(
                "expected {} events, got {}",
                expected.expected.len(),
                observed.len()
            ),
        });
    }

    for (index, (want, got)) in expected.expected.iter().zip(observed).enumerate() {
        if want != got {
            return Err(VerifyError::Mismatch {
                details: format!(
                    "event {} differs\nexpected: {}\nactual: {}",
                    index,
                    compact(want),
                    compact(got)
                ),
            });
        }
    }
    Ok(())
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// Compare `observed` with the golden file of `case_path`, (re)writing the
/// golden file first when `generate` is set.
pub fn verify(case_path: &Path, observed: &[Value], generate: bool) -> Result<(), VerifyError> {
    if generate {
        write_expected(case_path, observed)?;
    }

    let expected = read_expected(case_path).context("comparing test results failed")?;
    compare(&expected, observed)
}
