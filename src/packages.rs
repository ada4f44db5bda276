use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::TestType;

pub const MANIFEST_FILE: &str = "manifest.yml";
const DATA_STREAM_DIR: &str = "data_stream";

#[derive(Debug, Clone, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataStreamManifest {
    #[serde(rename = "type", default = "default_data_stream_type")]
    pub kind: String,
}

fn default_data_stream_type() -> String {
    "logs".to_string()
}

/// A folder of test cases for one test type of one data stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFolder {
    pub path: PathBuf,
    pub package: String,
    pub data_stream: String,
}

/// Walk up from `path` to the directory owning it as a data stream: the first
/// ancestor holding a manifest whose parent directory is `data_stream`.
pub fn find_data_stream_root(path: &Path) -> Result<Option<PathBuf>> {
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to resolve path {}", path.display()))?;

    for dir in path.ancestors() {
        let in_data_streams = dir
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|name| name == DATA_STREAM_DIR);
        if in_data_streams && dir.join(MANIFEST_FILE).is_file() {
            return Ok(Some(dir.to_path_buf()));
        }
    }
    Ok(None)
}

/// Walk up from `path` to the package root: the first ancestor holding a
/// manifest that is not a data stream manifest.
pub fn find_package_root(path: &Path) -> Result<Option<PathBuf>> {
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to resolve path {}", path.display()))?;

    for dir in path.ancestors() {
        let in_data_streams = dir
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|name| name == DATA_STREAM_DIR);
        if !in_data_streams && dir.join(MANIFEST_FILE).is_file() {
            return Ok(Some(dir.to_path_buf()));
        }
    }
    Ok(None)
}

pub fn read_package_manifest(package_root: &Path) -> Result<PackageManifest> {
    let path = package_root.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("reading package manifest failed (path: {})", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("parsing package manifest failed (path: {})", path.display()))
}

pub fn read_data_stream_manifest(data_stream_root: &Path) -> Result<DataStreamManifest> {
    let path = data_stream_root.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path).with_context(|| {
        format!("reading data stream manifest failed (path: {})", path.display())
    })?;
    if content.trim().is_empty() {
        return Ok(DataStreamManifest {
            kind: default_data_stream_type(),
        });
    }
    serde_yaml::from_str(&content).with_context(|| {
        format!("parsing data stream manifest failed (path: {})", path.display())
    })
}

/// Find `data_stream/<ds>/_dev/test/<type>` folders under a package, sorted by
/// data stream name. An empty `data_streams` filter selects all of them.
pub fn find_test_folders(
    package_root: &Path,
    test_type: &TestType,
    data_streams: &[String],
) -> Result<Vec<TestFolder>> {
    let manifest = read_package_manifest(package_root)?;

    let root = glob::Pattern::escape(&package_root.to_string_lossy());
    let pattern = Path::new(&root)
        .join(DATA_STREAM_DIR)
        .join("*")
        .join("_dev")
        .join("test")
        .join(glob::Pattern::escape(test_type.as_str()))
        .to_string_lossy()
        .to_string();

    let mut folders = Vec::new();
    for entry in glob::glob(&pattern)
        .context("invalid test folder pattern")?
        .flatten()
    {
        if !entry.is_dir() {
            continue;
        }
        // <ds>/_dev/test/<type>
        let Some(data_stream) = entry
            .ancestors()
            .nth(3)
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
        else {
            continue;
        };
        if !data_streams.is_empty() && !data_streams.contains(&data_stream) {
            continue;
        }
        folders.push(TestFolder {
            path: entry,
            package: manifest.name.clone(),
            data_stream,
        });
    }

    folders.sort_by(|a, b| a.data_stream.cmp(&b.data_stream));
    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn package(dir: &Path) {
        write(&dir.join("manifest.yml"), "name: nginx\nversion: 1.2.0\n");
        write(
            &dir.join("data_stream/access/manifest.yml"),
            "title: access\ntype: logs\n",
        );
        write(
            &dir.join("data_stream/error/manifest.yml"),
            "title: error\n",
        );
        fs::create_dir_all(dir.join("data_stream/access/_dev/test/pipeline")).unwrap();
        fs::create_dir_all(dir.join("data_stream/error/_dev/test/pipeline")).unwrap();
    }

    #[test]
    fn data_stream_root_is_found_from_test_folder() {
        let tmp = tempfile::tempdir().unwrap();
        package(tmp.path());

        let folder = tmp.path().join("data_stream/access/_dev/test/pipeline");
        let root = find_data_stream_root(&folder).unwrap().unwrap();
        assert_eq!(
            root,
            tmp.path().join("data_stream/access").canonicalize().unwrap()
        );

        let pkg = find_package_root(&folder).unwrap().unwrap();
        assert_eq!(pkg, tmp.path().canonicalize().unwrap());
    }

    #[test]
    fn data_stream_root_is_absent_outside_data_streams() {
        let tmp = tempfile::tempdir().unwrap();
        package(tmp.path());
        assert!(find_data_stream_root(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_folders_are_filtered_and_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        package(tmp.path());

        let all = find_test_folders(tmp.path(), &TestType::pipeline(), &[]).unwrap();
        let names: Vec<_> = all.iter().map(|f| f.data_stream.as_str()).collect();
        assert_eq!(names, vec!["access", "error"]);
        assert!(all.iter().all(|f| f.package == "nginx"));

        let only = find_test_folders(tmp.path(), &TestType::pipeline(), &["error".into()]).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].data_stream, "error");
    }

    #[test]
    fn package_root_with_glob_characters_is_literal() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("pkg [v1]*");
        package(&root);

        let folders = find_test_folders(&root, &TestType::pipeline(), &[]).unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.data_stream.as_str()).collect();
        assert_eq!(names, vec!["access", "error"]);
        assert!(folders.iter().all(|f| f.path.starts_with(&root)));
    }

    #[test]
    fn data_stream_type_defaults_to_logs() {
        let tmp = tempfile::tempdir().unwrap();
        package(tmp.path());
        let manifest = read_data_stream_manifest(&tmp.path().join("data_stream/error")).unwrap();
        assert_eq!(manifest.kind, "logs");
    }
}
