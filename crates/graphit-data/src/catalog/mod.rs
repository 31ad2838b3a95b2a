//! Cached artifacts on disk

pub mod merge;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use ahash::AHashMap;
use graphit_core::Table;
use parking_lot::RwLock;

use crate::codec::ColumnCodec;
use crate::config::DataConfig;
use crate::{persist, Result};

/// Artifact name written by a successful merge
pub const MERGED_ARTIFACT: &str = "modified_data";

/// Size and modification time identifying one version of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct LoadedTable {
    stamp: FileStamp,
    table: Arc<Table>,
}

/// Lists, loads and writes cached artifacts
///
/// Decoded tables are kept in memory and reused while the file on disk
/// is unchanged. Clones share that memory.
#[derive(Clone)]
pub struct CacheCatalog {
    dir: PathBuf,
    extension: String,
    codec: ColumnCodec,
    loaded: Arc<RwLock<AHashMap<String, LoadedTable>>>,
}

impl CacheCatalog {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>, codec: ColumnCodec) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            codec,
            loaded: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    pub fn from_config(config: &DataConfig) -> Result<Self> {
        Ok(Self::new(
            config.paths().data,
            config.cache_extension.clone(),
            ColumnCodec::from_config(config)?,
        ))
    }

    /// Artifact name for a source file: its name without extension
    pub fn artifact_name(source_name: &str) -> String {
        Path::new(source_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_name.to_string())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, self.extension))
    }

    /// Artifact names, sorted, after an empty "no selection" entry
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(vec![String::new()])
            }
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let matches_ext = path
                .extension()
                .map(|ext| ext.to_string_lossy() == self.extension.as_str())
                .unwrap_or(false);
            if let (true, Some(stem)) = (matches_ext, path.file_stem()) {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        names.insert(0, String::new());
        Ok(names)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    pub fn load(&self, name: &str) -> Result<Table> {
        let path = self.path_for(name);
        let stamp = FileStamp::of(&path);

        if let Some(stamp) = stamp {
            if let Some(hit) = self.loaded.read().get(name).filter(|hit| hit.stamp == stamp) {
                tracing::debug!("Reusing decoded artifact {}", name);
                return Ok(hit.table.as_ref().clone());
            }
        }

        let table = self.codec.read_file(&path)?;
        if let Some(stamp) = stamp {
            self.loaded.write().insert(
                name.to_string(),
                LoadedTable {
                    stamp,
                    table: Arc::new(table.clone()),
                },
            );
        }
        Ok(table)
    }

    /// Write `table` as `name`, replacing any previous artifact
    pub fn save(&self, name: &str, table: &Table) -> Result<()> {
        self.codec.write_file(&self.path_for(name), table)?;
        self.loaded.write().remove(name);
        tracing::info!("Saved cached artifact {}", name);
        Ok(())
    }

    /// Delete an artifact; returns whether one existed
    pub fn remove(&self, name: &str) -> Result<bool> {
        self.loaded.write().remove(name);
        persist::remove_if_exists(&self.path_for(name))
    }

    /// Outer join two flat tables and persist the result as [`MERGED_ARTIFACT`]
    pub fn merge(&self, left: &Table, right: &Table, on: &str) -> Option<Table> {
        let merged = merge::outer_join(left, right, on)?;
        if let Err(err) = self.save(MERGED_ARTIFACT, &merged) {
            tracing::error!("Failed to persist merged table: {}", err);
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataError;
    use graphit_core::ColumnValues;
    use tempfile::TempDir;

    fn catalog(temp: &TempDir) -> CacheCatalog {
        CacheCatalog::new(temp.path().join("data"), "pqt", ColumnCodec::default())
    }

    fn table(values: &[f64]) -> Table {
        Table::flat(vec![(
            "v",
            ColumnValues::Float(values.iter().copied().map(Some).collect()),
        )])
        .unwrap()
    }

    #[test]
    fn test_list_has_sentinel() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog(&temp);
        assert_eq!(catalog.list().unwrap(), vec![String::new()]);

        catalog.save("b", &table(&[1.0])).unwrap();
        catalog.save("a", &table(&[2.0])).unwrap();
        std::fs::write(catalog.dir().join("notes.txt"), "x").unwrap();
        assert_eq!(catalog.list().unwrap(), vec!["", "a", "b"]);
    }

    #[test]
    fn test_save_replaces_loaded_copy() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog(&temp);
        catalog.save("t", &table(&[1.0])).unwrap();
        assert_eq!(catalog.load("t").unwrap(), table(&[1.0]));

        catalog.save("t", &table(&[1.0, 2.0])).unwrap();
        assert_eq!(catalog.load("t").unwrap(), table(&[1.0, 2.0]));
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog(&temp);
        assert!(matches!(catalog.load("absent"), Err(DataError::NotFound(_))));

        std::fs::create_dir_all(catalog.dir()).unwrap();
        std::fs::write(catalog.path_for("junk"), b"not parquet").unwrap();
        assert!(matches!(catalog.load("junk"), Err(DataError::CorruptArtifact { .. })));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog(&temp);
        catalog.save("t", &table(&[1.0])).unwrap();
        assert!(catalog.remove("t").unwrap());
        assert!(!catalog.remove("t").unwrap());
        assert!(!catalog.exists("t"));
    }

    #[test]
    fn test_merge_persists_result() {
        let temp = TempDir::new().unwrap();
        let catalog = catalog(&temp);
        let left = Table::flat(vec![("id", ColumnValues::Integer(vec![Some(1)]))]).unwrap();
        let right = Table::flat(vec![("id", ColumnValues::Integer(vec![Some(2)]))]).unwrap();

        let merged = catalog.merge(&left, &right, "id").unwrap();
        assert_eq!(catalog.load(MERGED_ARTIFACT).unwrap(), merged);
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(CacheCatalog::artifact_name("iso_terrain.csv"), "iso_terrain");
        assert_eq!(CacheCatalog::artifact_name("plain"), "plain");
    }
}
