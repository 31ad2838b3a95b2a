//! Source registry and columnar cache for the Graph-It data platform

pub mod catalog;
pub mod codec;
pub mod config;
pub mod format;
pub mod ingest;
pub mod persist;
pub mod pipeline;
pub mod plot_store;
pub mod registry;
pub mod session;

use std::path::PathBuf;

use arrow::error::ArrowError;
use graphit_core::CoreError;
use parquet::errors::ParquetError;
use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use catalog::CacheCatalog;
pub use codec::ColumnCodec;
pub use config::{DataConfig, NullConfig, StorePaths};
pub use ingest::{GeneratorId, IngestFailure, SourceIngestor, SourceKind};
pub use pipeline::{PipelineState, UpdatePipeline, UpdateReport, UpdateRun};
pub use plot_store::PlotMapStore;
pub use registry::{RegistryDocument, SourceEntry, SourceRegistry};
pub use session::{Session, UpdateHandle};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Source '{name}' cannot be reached at {}", path.display())]
    OriginUnreachable { name: String, path: PathBuf },

    #[error("Source '{name}' could not be parsed: {reason}")]
    Unparsable { name: String, reason: String },

    #[error("Cached artifact '{name}' is corrupt: {reason}")]
    CorruptArtifact { name: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation requires a flat table")]
    NotTabular,

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Source '{name}' would overwrite artifact '{artifact}' of {owner}")]
    ArtifactConflict {
        name: String,
        artifact: String,
        owner: String,
    },

    #[error("A source update is already running")]
    UpdateInProgress,

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Table error: {0}")]
    Core(#[from] CoreError),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => {
                DataError::Io(std::io::Error::new(io_err.kind(), error.to_string()))
            }
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<ArrowError> for DataError {
    fn from(error: ArrowError) -> Self {
        DataError::Arrow(error)
    }
}

impl From<ParquetError> for DataError {
    fn from(error: ParquetError) -> Self {
        DataError::Parquet(error)
    }
}

impl From<calamine::Error> for DataError {
    fn from(error: calamine::Error) -> Self {
        DataError::Spreadsheet(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
