//! Plot map documents on disk

use std::path::{Path, PathBuf};

use graphit_core::PlotMap;

use crate::{persist, DataError, Result};

const FILE_PREFIX: &str = "plot_map_";
const FILE_SUFFIX: &str = ".json";

/// One JSON document per plot map, named `plot_map_<id>.json`
#[derive(Debug, Clone)]
pub struct PlotMapStore {
    dir: PathBuf,
}

impl PlotMapStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}{}", FILE_PREFIX, id, FILE_SUFFIX))
    }

    /// Ids of stored plot maps, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(id) = name
                .strip_prefix(FILE_PREFIX)
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn load(&self, id: &str) -> Result<PlotMap> {
        let path = self.path_for(id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::NotFound(format!("plot map {}", id)))
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Every readable plot map; unreadable documents are skipped
    pub fn load_all(&self) -> Result<Vec<PlotMap>> {
        let mut maps = Vec::new();
        for id in self.list()? {
            match self.load(&id) {
                Ok(map) => maps.push(map),
                Err(err) => tracing::warn!("Skipping plot map {}: {}", id, err),
            }
        }
        Ok(maps)
    }

    pub fn save(&self, map: &PlotMap) -> Result<()> {
        let json = serde_json::to_vec_pretty(map)?;
        persist::write_atomic(&self.path_for(&map.id), &json)?;
        tracing::debug!("Saved plot map {}", map.id);
        Ok(())
    }

    /// Delete a plot map; returns whether one existed
    pub fn delete(&self, id: &str) -> Result<bool> {
        persist::remove_if_exists(&self.path_for(id))
    }

    /// Lowest id from 1 upwards that no stored plot map uses
    pub fn next_id(&self) -> Result<u32> {
        let taken: Vec<u32> = self.list()?.iter().filter_map(|id| id.parse().ok()).collect();
        Ok((1..).find(|id| !taken.contains(id)).unwrap_or(1))
    }

    /// A fresh plot map with the next free id
    pub fn create(&self) -> Result<PlotMap> {
        Ok(PlotMap::new(self.next_id()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphit_core::{ColumnValues, Table};
    use tempfile::TempDir;

    #[test]
    fn test_save_list_load() {
        let temp = TempDir::new().unwrap();
        let store = PlotMapStore::new(temp.path());
        assert!(store.list().unwrap().is_empty());

        let mut map = store.create().unwrap();
        assert_eq!(map.id, "01");
        map.title = "Sales".to_string();
        let table =
            Table::flat(vec![("x", ColumnValues::Integer(vec![Some(1), Some(2)]))]).unwrap();
        map.set_data("sales", table);
        store.save(&map).unwrap();

        assert!(temp.path().join("plot_map_01.json").is_file());
        assert_eq!(store.list().unwrap(), vec!["01"]);
        assert_eq!(store.load("01").unwrap(), map);
    }

    #[test]
    fn test_next_id_fills_gaps() {
        let temp = TempDir::new().unwrap();
        let store = PlotMapStore::new(temp.path());
        for id in [1, 2, 3] {
            store.save(&PlotMap::new(id)).unwrap();
        }
        assert_eq!(store.next_id().unwrap(), 4);

        assert!(store.delete("02").unwrap());
        assert!(!store.delete("02").unwrap());
        assert_eq!(store.next_id().unwrap(), 2);
    }

    #[test]
    fn test_load_all_skips_garbage() {
        let temp = TempDir::new().unwrap();
        let store = PlotMapStore::new(temp.path());
        store.save(&PlotMap::new(1)).unwrap();
        std::fs::write(store.path_for("02"), "{not json").unwrap();

        let maps = store.load_all().unwrap();
        assert_eq!(maps.len(), 1);
        assert!(matches!(store.load("07"), Err(DataError::NotFound(_))));
    }
}
