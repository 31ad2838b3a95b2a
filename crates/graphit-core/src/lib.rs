//! Core types for the Graph-It data platform
//!
//! This crate holds the value types exchanged between ingestion, the
//! columnar cache and plotting. Nothing in here touches the filesystem.

pub mod events;
pub mod plot;
pub mod prefix;
pub mod table;

use thiserror::Error;

// Re-export commonly used types
pub use events::ProgressEvent;
pub use plot::{Axis, PlotFamily, PlotKind, PlotMap, RenderCommand, Series};
pub use prefix::Prefix;
pub use table::{ColumnData, ColumnValues, ScalarKey, ScalarType, Shape, Table, TableKind};

/// Errors raised while building or validating core values
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' has {elements} elements which cannot be viewed as shape {shape}")]
    ShapeMismatch {
        column: String,
        shape: String,
        elements: usize,
    },

    #[error("column not found: {0}")]
    MissingColumn(String),

    #[error("table snapshot is malformed: {0}")]
    Snapshot(String),

    #[error("'{name}' already classifies as {found:?}, not {declared:?}")]
    PrefixMismatch {
        name: String,
        declared: crate::Prefix,
        found: crate::Prefix,
    },

    #[error("unknown plot type: {0}")]
    UnknownPlotKind(String),

    #[error("plot '{plot}' cannot be drawn: {reason}")]
    IncompatiblePlot { plot: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
