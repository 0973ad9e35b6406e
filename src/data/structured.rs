//! Structured (YAML) data documents.

use super::{Data, DataError, as_data};
use crate::error;
use crate::logger::Logger;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Extensions of structured documents, in lookup order.
pub const EXTENSIONS: &[&str] = &["yaml", "yml"];

/// A YAML document owned by one scope, parsed on first access.
#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    cache: Option<Data>,
}

impl Document {
    pub fn new(path: PathBuf) -> Self {
        Self { path, cache: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed content; an unreadable or invalid document yields `{}`.
    pub fn data(&mut self, log: &Logger) -> &Data {
        let path = &self.path;
        self.cache.get_or_insert_with(|| load_or_log(path, log))
    }

    /// Re-read the document, replacing the cached content.
    pub fn update(&mut self, log: &Logger) {
        self.cache = Some(load_or_log(&self.path, log));
    }
}

fn load_or_log(path: &Path, log: &Logger) -> Data {
    load(path).unwrap_or_else(|e| {
        error!(log, "data"; "{:#}", anyhow::Error::from(e));
        Data::new()
    })
}

/// Parse a YAML document into a mapping. An empty document is `{}`.
pub fn load(path: &Path) -> Result<Data, DataError> {
    let content = fs::read_to_string(path).map_err(|e| DataError::Io(path.to_path_buf(), e))?;
    if content.trim().is_empty() {
        return Ok(Data::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|source| DataError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

    match value {
        serde_yaml::Value::Null => Ok(Data::new()),
        serde_yaml::Value::Mapping(_) => serde_json::to_value(&value)
            .ok()
            .and_then(as_data)
            .ok_or_else(|| DataError::NotAMapping(path.to_path_buf())),
        _ => Err(DataError::NotAMapping(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_mapping() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "site.yaml", "title: Home\ntags: [a, b]\nnested:\n  n: 1\n");

        let data = load(&path).unwrap();
        assert_eq!(
            Value::Object(data),
            json!({"title": "Home", "tags": ["a", "b"], "nested": {"n": 1}})
        );
    }

    #[test]
    fn test_load_empty_document() {
        let dir = TempDir::new().unwrap();
        assert!(load(&write(&dir, "a.yaml", "")).unwrap().is_empty());
        assert!(load(&write(&dir, "b.yaml", "\n  \n")).unwrap().is_empty());
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "list.yaml", "- a\n- b\n");
        assert!(matches!(load(&path), Err(DataError::NotAMapping(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.yaml", "title: [unclosed\n");
        assert!(matches!(load(&path), Err(DataError::Yaml { .. })));
    }

    #[test]
    fn test_document_caches_until_update() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "site.yaml", "v: 1");
        let log = Logger::silent();
        let mut doc = Document::new(path.clone());

        assert_eq!(doc.data(&log).get("v"), Some(&json!(1)));

        fs::write(&path, "v: 2").unwrap();
        assert_eq!(doc.data(&log).get("v"), Some(&json!(1)));

        doc.update(&log);
        assert_eq!(doc.data(&log).get("v"), Some(&json!(2)));
    }

    #[test]
    fn test_document_broken_update_is_empty_not_stale() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "site.yaml", "v: 1");
        let log = Logger::silent();
        let mut doc = Document::new(path.clone());
        assert!(!doc.data(&log).is_empty());

        fs::write(&path, "v: [").unwrap();
        doc.update(&log);

        assert!(doc.data(&log).is_empty());
    }
}
