//! Persistent registry of external sources
//!
//! The registry is one JSON document. Reads go straight to disk; every
//! write is a read-modify-write of the whole document under one mutex,
//! replaced atomically so a reader never sees a partial file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::ingest::SourceKind;
use crate::{persist, DataError, Result};

/// Origin and text encoding of one registered source
///
/// Persisted as `[origin_path, encoding]`; a bare origin string is
/// accepted from older documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRecord", into = "RawRecord")]
pub struct SourceRecord {
    pub origin: PathBuf,
    pub encoding: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Pair(String, Option<String>),
    Legacy(String),
}

impl From<RawRecord> for SourceRecord {
    fn from(raw: RawRecord) -> Self {
        match raw {
            RawRecord::Pair(origin, encoding) => Self {
                origin: PathBuf::from(origin),
                encoding,
            },
            RawRecord::Legacy(origin) => Self {
                origin: PathBuf::from(origin),
                encoding: None,
            },
        }
    }
}

impl From<SourceRecord> for RawRecord {
    fn from(record: SourceRecord) -> Self {
        RawRecord::Pair(record.origin.to_string_lossy().into_owned(), record.encoding)
    }
}

/// The registry document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryDocument {
    pub sources: IndexMap<String, SourceRecord>,
    /// Directory the last source was added from
    pub source_dir: String,
    /// Directory the last export was written to
    pub output_dir: String,
}

/// A registered source as handed to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub origin_path: PathBuf,
    pub text_encoding: Option<String>,
}

impl SourceEntry {
    fn from_record(name: &str, record: &SourceRecord) -> Self {
        Self {
            name: name.to_string(),
            origin_path: record.origin.clone(),
            text_encoding: record.encoding.clone(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        SourceKind::External {
            origin_path: self.origin_path.clone(),
            encoding: self.text_encoding.clone(),
        }
    }
}

/// Mutex-guarded owner of the registry document
pub struct SourceRegistry {
    path: PathBuf,
    writer: Mutex<()>,
}

impl SourceRegistry {
    /// Open the document at `path`, creating an empty one if absent
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let registry = Self {
            path: path.into(),
            writer: Mutex::new(()),
        };
        if !registry.path.exists() {
            registry.commit(|_| ())?;
            tracing::info!("Created source registry at {}", registry.path.display());
        }
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last fully written document
    pub fn load(&self) -> Result<RegistryDocument> {
        read_document(&self.path)
    }

    /// Apply `mutation` to the current document and persist it
    pub fn commit<R>(&self, mutation: impl FnOnce(&mut RegistryDocument) -> R) -> Result<R> {
        let _guard = self.writer.lock();
        let mut document = read_document(&self.path)?;
        let result = mutation(&mut document);
        let bytes = serde_json::to_vec_pretty(&document)?;
        persist::write_atomic(&self.path, &bytes)?;
        Ok(result)
    }

    /// Add a source unless the name is taken; returns whether it was added
    pub fn register_source(&self, name: &str, origin: &Path) -> Result<bool> {
        let added = self.commit(|doc| {
            if doc.sources.contains_key(name) {
                return false;
            }
            doc.sources.insert(
                name.to_string(),
                SourceRecord {
                    origin: origin.to_path_buf(),
                    encoding: None,
                },
            );
            true
        })?;
        if added {
            tracing::info!("Registered source {} from {}", name, origin.display());
        } else {
            tracing::debug!("Source {} already registered", name);
        }
        Ok(added)
    }

    /// Forget a source; removing an unknown name is not an error
    pub fn remove_source(&self, name: &str) -> Result<bool> {
        self.commit(|doc| doc.sources.shift_remove(name).is_some())
    }

    pub fn set_encoding(&self, name: &str, encoding: &str) -> Result<()> {
        let found = self.commit(|doc| match doc.sources.get_mut(name) {
            Some(record) => {
                record.encoding = Some(encoding.to_string());
                true
            }
            None => false,
        })?;
        if found {
            tracing::debug!("Recorded encoding {} for {}", encoding, name);
            Ok(())
        } else {
            Err(DataError::NotFound(name.to_string()))
        }
    }

    /// Point an existing source at a new origin
    pub fn set_origin(&self, name: &str, origin: &Path) -> Result<()> {
        let found = self.commit(|doc| match doc.sources.get_mut(name) {
            Some(record) => {
                record.origin = origin.to_path_buf();
                true
            }
            None => false,
        })?;
        if found {
            Ok(())
        } else {
            Err(DataError::NotFound(name.to_string()))
        }
    }

    pub fn set_source_dir(&self, dir: &Path) -> Result<()> {
        self.commit(|doc| doc.source_dir = dir.to_string_lossy().into_owned())
    }

    pub fn set_output_dir(&self, dir: &Path) -> Result<()> {
        self.commit(|doc| doc.output_dir = dir.to_string_lossy().into_owned())
    }

    pub fn entries(&self) -> Result<Vec<SourceEntry>> {
        Ok(self
            .load()?
            .sources
            .iter()
            .map(|(name, record)| SourceEntry::from_record(name, record))
            .collect())
    }

    pub fn entry(&self, name: &str) -> Result<Option<SourceEntry>> {
        Ok(self
            .load()?
            .sources
            .get(name)
            .map(|record| SourceEntry::from_record(name, record)))
    }

    /// Block until no commit is in progress
    pub fn quiesce(&self) {
        drop(self.writer.lock());
    }
}

fn read_document(path: &Path) -> Result<RegistryDocument> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(RegistryDocument::default()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> SourceRegistry {
        SourceRegistry::open(temp.path().join("spec.json")).unwrap()
    }

    #[test]
    fn test_open_creates_default_document() {
        let temp = TempDir::new().unwrap();
        let reg = registry(&temp);
        let text = std::fs::read_to_string(reg.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, serde_json::json!({"sources": {}, "source_dir": "", "output_dir": ""}));
    }

    #[test]
    fn test_register_is_noop_for_existing_name() {
        let temp = TempDir::new().unwrap();
        let reg = registry(&temp);
        assert!(reg.register_source("sales.csv", Path::new("/data/sales.csv")).unwrap());
        assert!(!reg.register_source("sales.csv", Path::new("/elsewhere/sales.csv")).unwrap());

        let entry = reg.entry("sales.csv").unwrap().unwrap();
        assert_eq!(entry.origin_path, PathBuf::from("/data/sales.csv"));
        assert_eq!(entry.text_encoding, None);
    }

    #[test]
    fn test_record_wire_format_and_legacy_entries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("spec.json");
        std::fs::write(
            &path,
            r#"{
                "sources": {"old.csv": "/data/old.csv", "new.csv": ["/data/new.csv", "ascii"]},
                "source_dir": "/data"
            }"#,
        )
        .unwrap();
        let reg = SourceRegistry::open(&path).unwrap();

        let entries = reg.entries().unwrap();
        assert_eq!(entries[0].name, "old.csv");
        assert_eq!(entries[0].text_encoding, None);
        assert_eq!(entries[1].text_encoding.as_deref(), Some("ascii"));

        reg.set_encoding("old.csv", "UTF-8").unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["sources"]["old.csv"], serde_json::json!(["/data/old.csv", "UTF-8"]));
        assert_eq!(value["output_dir"], "");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let reg = registry(&temp);
        reg.register_source("a.csv", Path::new("/a.csv")).unwrap();
        assert!(reg.remove_source("a.csv").unwrap());
        assert!(!reg.remove_source("a.csv").unwrap());
        assert!(reg.entries().unwrap().is_empty());
    }

    #[test]
    fn test_updates_on_unknown_names() {
        let temp = TempDir::new().unwrap();
        let reg = registry(&temp);
        assert!(matches!(reg.set_encoding("nope", "UTF-8"), Err(DataError::NotFound(_))));
        assert!(matches!(reg.set_origin("nope", Path::new("/x")), Err(DataError::NotFound(_))));
    }

    #[test]
    fn test_concurrent_commits_are_all_applied() {
        let temp = TempDir::new().unwrap();
        let reg = Arc::new(registry(&temp));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    let name = format!("s{}.csv", i);
                    reg.register_source(&name, Path::new("/o")).unwrap();
                    reg.set_encoding(&name, "UTF-8").unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        reg.quiesce();

        let entries = reg.entries().unwrap();
        assert_eq!(entries.len(), 8);
        assert!(entries.iter().all(|e| e.text_encoding.as_deref() == Some("UTF-8")));
    }
}
