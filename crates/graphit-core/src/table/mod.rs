//! Uniform in-memory table exchanged between ingestion, cache and plotting

pub mod infer;
pub mod json;
pub mod shape;
pub mod temporal;
pub mod values;

use indexmap::IndexMap;

use crate::{CoreError, Result};

pub use shape::Shape;
pub use values::{ColumnValues, ScalarKey, ScalarType};

/// Whether a table behaves as a data frame or as a dict of arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Every column is one-dimensional and all share one length
    Flat,
    /// Columns carry their own n-dimensional shapes
    Shaped,
}

/// One column's payload plus its shape descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnData {
    values: ColumnValues,
    shape: Shape,
}

impl ColumnData {
    /// A flat column, one scalar per row
    pub fn flat(values: ColumnValues) -> Self {
        Self {
            values,
            shape: Shape::scalar(),
        }
    }

    /// A column viewed as `shape`; the element count must match
    pub fn shaped(name: &str, values: ColumnValues, shape: Shape) -> Result<Self> {
        if let Some(expected) = shape.element_count() {
            if expected != values.len() || shape.dims().contains(&0) {
                return Err(CoreError::ShapeMismatch {
                    column: name.to_string(),
                    shape: shape.to_string(),
                    elements: values.len(),
                });
            }
        }
        Ok(Self { values, shape })
    }

    pub fn values(&self) -> &ColumnValues {
        &self.values
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn scalar_type(&self) -> ScalarType {
        self.values.scalar_type()
    }

    /// Number of stored elements regardless of shape
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_parts(self) -> (ColumnValues, Shape) {
        (self.values, self.shape)
    }
}

/// Ordered, uniquely named collection of columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: IndexMap<String, ColumnData>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a data-frame style table; all columns must share a length
    pub fn flat<N: Into<String>>(columns: Vec<(N, ColumnValues)>) -> Result<Self> {
        let mut table = Self::new();
        for (name, values) in columns {
            table.insert_column(name.into(), ColumnData::flat(values))?;
        }
        Ok(table)
    }

    /// Build a dict-of-arrays table from already shaped columns
    pub fn shaped<N: Into<String>>(columns: Vec<(N, ColumnData)>) -> Result<Self> {
        let mut map = IndexMap::with_capacity(columns.len());
        for (name, data) in columns {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(CoreError::DuplicateColumn(name));
            }
            map.insert(name, data);
        }
        let table = Self { columns: map };
        if table.is_flat() {
            table.check_lengths()?;
        }
        Ok(table)
    }

    pub fn kind(&self) -> TableKind {
        if self.is_flat() {
            TableKind::Flat
        } else {
            TableKind::Shaped
        }
    }

    pub fn is_flat(&self) -> bool {
        self.columns.values().all(|c| c.shape().is_scalar())
    }

    /// Row count of a flat table, `None` for shaped tables
    pub fn row_count(&self) -> Option<usize> {
        if !self.is_flat() {
            return None;
        }
        Some(self.columns.values().next().map(ColumnData::len).unwrap_or(0))
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.get(name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnData)> {
        self.columns.iter().map(|(name, data)| (name.as_str(), data))
    }

    /// Append a column, keeping flat tables rectangular
    pub fn insert_column(&mut self, name: String, data: ColumnData) -> Result<()> {
        self.insert_column_at(self.columns.len(), name, data)
    }

    /// Insert a column at `index`, keeping flat tables rectangular
    pub fn insert_column_at(&mut self, index: usize, name: String, data: ColumnData) -> Result<()> {
        if self.columns.contains_key(&name) {
            return Err(CoreError::DuplicateColumn(name));
        }
        if data.shape().is_scalar() {
            if let Some(expected) = self.row_count().filter(|_| !self.columns.is_empty()) {
                if expected != data.len() {
                    return Err(CoreError::LengthMismatch {
                        column: name,
                        expected,
                        found: data.len(),
                    });
                }
            }
        }
        let index = index.min(self.columns.len());
        self.columns.shift_insert(index, name, data);
        Ok(())
    }

    /// Remove a column preserving the order of the rest
    pub fn remove_column(&mut self, name: &str) -> Option<ColumnData> {
        self.columns.shift_remove(name)
    }

    pub fn into_columns(self) -> impl Iterator<Item = (String, ColumnData)> {
        self.columns.into_iter()
    }

    fn check_lengths(&self) -> Result<()> {
        let mut iter = self.columns.iter();
        if let Some((_, first)) = iter.next() {
            let expected = first.len();
            for (name, data) in iter {
                if data.len() != expected {
                    return Err(CoreError::LengthMismatch {
                        column: name.clone(),
                        expected,
                        found: data.len(),
                    });
                }
            }
        }
        Ok(())
    }
}
