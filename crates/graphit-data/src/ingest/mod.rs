//! Turning sources into tables

pub mod delimited;
pub mod encoding;
pub mod generators;
pub mod json;
pub mod spreadsheet;

use std::path::{Path, PathBuf};

use graphit_core::{Prefix, Table};
use thiserror::Error;

use crate::config::NullConfig;
use crate::{DataError, Result};

pub use generators::GeneratorId;

/// File formats accepted for external sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
    Spreadsheet,
}

impl SourceFormat {
    /// Format by file extension, case-insensitive
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SourceFormat::Csv),
            "json" => Some(SourceFormat::Json),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Some(SourceFormat::Spreadsheet),
            _ => None,
        }
    }

    /// Whether the format is text and carries a text encoding
    pub fn is_text(&self) -> bool {
        !matches!(self, SourceFormat::Spreadsheet)
    }
}

/// Where a source's table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Built-in generator; always fresh, never copied
    Internal(GeneratorId),
    /// Registered file; the origin may be stale
    External {
        origin_path: PathBuf,
        encoding: Option<String>,
    },
}

/// A source that could not be turned into a table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {reason}")]
pub struct IngestFailure {
    pub name: String,
    pub reason: String,
}

/// Reads external files and runs generators
#[derive(Debug, Clone, Default)]
pub struct SourceIngestor {
    nulls: NullConfig,
}

impl SourceIngestor {
    pub fn new(nulls: NullConfig) -> Self {
        Self { nulls }
    }

    pub fn classify(file_name: &str) -> Prefix {
        Prefix::classify(file_name)
    }

    /// Parse the file at `path` according to its extension
    pub fn ingest_external(
        &self,
        path: &Path,
        encoding: Option<&str>,
    ) -> std::result::Result<Table, IngestFailure> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let failure = |reason: String| IngestFailure {
            name: name.clone(),
            reason,
        };

        let format = SourceFormat::from_path(path)
            .ok_or_else(|| failure("unsupported file type".to_string()))?;
        let table = match format {
            SourceFormat::Csv => delimited::read_csv(path, encoding, &self.nulls),
            SourceFormat::Json => json::read_json(path, encoding),
            SourceFormat::Spreadsheet => {
                spreadsheet::read_spreadsheet(path, &NullConfig::empty_only())
            }
        }
        .map_err(|err| failure(err.to_string()))?;

        tracing::debug!(
            "Ingested {} ({} columns, {:?} rows)",
            name,
            table.num_columns(),
            table.row_count()
        );
        Ok(table)
    }

    pub fn ingest_internal(&self, id: GeneratorId) -> std::result::Result<Table, IngestFailure> {
        id.generate().map_err(|err| IngestFailure {
            name: id.name().to_string(),
            reason: err.to_string(),
        })
    }

    /// Encoding label for a text source; binary formats have none
    pub fn detect_encoding(&self, path: &Path, threshold: usize) -> Result<Option<String>> {
        match SourceFormat::from_path(path) {
            Some(format) if format.is_text() => {
                let encoding = encoding::detect_encoding(path, threshold)?;
                Ok(Some(encoding.name().to_string()))
            }
            Some(_) => Ok(None),
            None => Err(DataError::Unparsable {
                name: path.display().to_string(),
                reason: "unsupported file type".to_string(),
            }),
        }
    }
}

/// Fill blank header cells and disambiguate repeated names
pub(crate) fn unique_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for (idx, name) in raw.enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while headers.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        headers.push(candidate);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_by_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a.CSV")), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_path(Path::new("b.xlsx")), Some(SourceFormat::Spreadsheet));
        assert_eq!(SourceFormat::from_path(Path::new("c.txt")), None);
        assert_eq!(SourceFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(SourceIngestor::classify("iso_terrain.csv"), Prefix::Isometric);
        assert_eq!(SourceIngestor::classify("iso_tri_mesh.csv"), Prefix::IsometricTriangulated);
        assert_eq!(SourceIngestor::classify("sales.csv"), Prefix::None);
    }

    #[test]
    fn test_unknown_extension_is_a_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let failure = SourceIngestor::default().ingest_external(&path, None).unwrap_err();
        assert_eq!(failure.name, "notes.txt");
    }

    #[test]
    fn test_csv_without_declared_encoding() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sales.csv");
        std::fs::write(&path, "a,b\n1,x\n2,y\n").unwrap();

        let table = SourceIngestor::default().ingest_external(&path, None).unwrap();
        assert_eq!(table.row_count(), Some(2));
        assert_eq!(
            SourceIngestor::default().detect_encoding(&path, 1024).unwrap().as_deref(),
            Some("UTF-8")
        );
    }
}
