//! Columnar artifact codec
//!
//! Tables are stored as a single parquet row group. Multi-dimensional
//! columns are flattened row-major and their shapes recorded in a
//! manifest kept in the file's key-value metadata under [`SHAPE_KEY`].
//! Decoding reapplies the manifest positionally, column `i` taking
//! entry `i`.

pub mod manifest;

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringBuilder,
    TimestampMillisecondArray,
};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{
    DataType, Field, Float64Type, Int64Type, Schema, TimeUnit, TimestampMillisecondType,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use graphit_core::{ColumnData, ColumnValues, Shape, Table};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::config::DataConfig;
use crate::{persist, DataError, Result};

pub use manifest::{format_manifest, parse_manifest};

/// Metadata key holding the shape manifest
pub const SHAPE_KEY: &str = "shape";

/// Encodes tables into cached artifacts and back
#[derive(Debug, Clone)]
pub struct ColumnCodec {
    compression: Compression,
}

impl Default for ColumnCodec {
    fn default() -> Self {
        Self::new(Compression::GZIP(GzipLevel::default()))
    }
}

impl ColumnCodec {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    pub fn from_config(config: &DataConfig) -> Result<Self> {
        Ok(Self::new(config.compression.to_parquet()?))
    }

    /// Serialize a table; identical tables give identical bytes
    pub fn encode(&self, table: &Table) -> Result<Vec<u8>> {
        if table.is_empty() {
            return Err(DataError::Shape("a table without columns cannot be stored".to_string()));
        }

        let shapes: Vec<Shape> = if table.is_flat() {
            Vec::new()
        } else {
            table.columns().map(|(_, data)| data.shape().clone()).collect()
        };

        let batch = record_batch(table)?;
        let schema = batch.schema();

        let manifest = KeyValue {
            key: SHAPE_KEY.to_string(),
            value: Some(format_manifest(&shapes)),
        };
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_key_value_metadata(Some(vec![manifest]))
            .build();

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(buf)
    }

    /// Rebuild a table; `name` labels errors
    pub fn decode(&self, name: &str, bytes: Bytes) -> Result<Table> {
        let corrupt = |reason: String| DataError::CorruptArtifact {
            name: name.to_string(),
            reason,
        };

        let builder =
            ParquetRecordBatchReaderBuilder::try_new(bytes).map_err(|e| corrupt(e.to_string()))?;
        let manifest = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|pairs| pairs.iter().find(|kv| kv.key == SHAPE_KEY))
            .and_then(|kv| kv.value.clone())
            .ok_or_else(|| corrupt("shape manifest is missing".to_string()))?;
        let shapes = parse_manifest(&manifest).map_err(&corrupt)?;

        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| corrupt(e.to_string()))?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| corrupt(e.to_string()))?;
        let batch = concat_batches(&schema, &batches).map_err(|e| corrupt(e.to_string()))?;

        if !shapes.is_empty() && shapes.len() != batch.num_columns() {
            return Err(corrupt(format!(
                "manifest lists {} shapes for {} columns",
                shapes.len(),
                batch.num_columns()
            )));
        }

        let mut columns = Vec::with_capacity(batch.num_columns());
        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let values = from_arrow(array)
                .map_err(|reason| corrupt(format!("column '{}': {}", field.name(), reason)))?;
            columns.push((field.name().clone(), values));
        }

        let table = if shapes.is_empty() {
            Table::flat(columns)
        } else {
            columns
                .into_iter()
                .zip(shapes)
                .map(|((column, values), shape)| {
                    ColumnData::shaped(&column, values, shape).map(|data| (column, data))
                })
                .collect::<graphit_core::Result<Vec<_>>>()
                .and_then(Table::shaped)
        };
        table.map_err(|e| corrupt(e.to_string()))
    }

    /// Encode and atomically replace the file at `path`
    pub fn write_file(&self, path: &Path, table: &Table) -> Result<()> {
        let bytes = self.encode(table)?;
        persist::write_atomic(path, &bytes)?;
        tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    pub fn read_file(&self, path: &Path) -> Result<Table> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::NotFound(name))
            }
            Err(err) => return Err(err.into()),
        };
        self.decode(&name, Bytes::from(bytes))
    }
}

/// Flatten every column of `table` into one arrow batch
///
/// All columns must flatten to the same number of elements.
pub fn record_batch(table: &Table) -> Result<RecordBatch> {
    let mut row_count = None;
    let mut fields = Vec::with_capacity(table.num_columns());
    let mut arrays = Vec::with_capacity(table.num_columns());
    for (name, data) in table.columns() {
        match row_count {
            Some(expected) if expected != data.len() => {
                return Err(DataError::Shape(format!(
                    "column '{}' flattens to {} elements, expected {}",
                    name,
                    data.len(),
                    expected
                )))
            }
            _ => row_count = Some(data.len()),
        }
        let (data_type, array) = to_arrow(data.values());
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(row_count);
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

fn to_arrow(values: &ColumnValues) -> (DataType, ArrayRef) {
    match values {
        ColumnValues::Integer(v) => (DataType::Int64, Arc::new(Int64Array::from(v.clone()))),
        ColumnValues::Float(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone()))),
        ColumnValues::Boolean(v) => (DataType::Boolean, Arc::new(BooleanArray::from(v.clone()))),
        ColumnValues::Timestamp(v) => (
            DataType::Timestamp(TimeUnit::Millisecond, None),
            Arc::new(TimestampMillisecondArray::from(v.clone())),
        ),
        ColumnValues::String(v) => {
            let mut builder = StringBuilder::with_capacity(v.len(), v.len() * 8);
            for cell in v {
                builder.append_option(cell.as_deref());
            }
            (DataType::Utf8, Arc::new(builder.finish()))
        }
    }
}

fn from_arrow(array: &ArrayRef) -> std::result::Result<ColumnValues, String> {
    let values = match array.data_type() {
        DataType::Int64 => {
            ColumnValues::Integer(array.as_primitive::<Int64Type>().iter().collect())
        }
        DataType::Float64 => {
            ColumnValues::Float(array.as_primitive::<Float64Type>().iter().collect())
        }
        DataType::Boolean => ColumnValues::Boolean(array.as_boolean().iter().collect()),
        DataType::Utf8 => ColumnValues::String(
            array
                .as_string::<i32>()
                .iter()
                .map(|cell| cell.map(str::to_string))
                .collect(),
        ),
        DataType::Timestamp(TimeUnit::Millisecond, None) => {
            ColumnValues::Timestamp(
                array
                    .as_primitive::<TimestampMillisecondType>()
                    .iter()
                    .collect(),
            )
        }
        // Artifacts written elsewhere may use narrower or wider physical types
        dt if dt.is_integer() => return widen(array, DataType::Int64),
        dt if dt.is_floating() => return widen(array, DataType::Float64),
        DataType::LargeUtf8 | DataType::Utf8View => return widen(array, DataType::Utf8),
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            return widen(array, DataType::Timestamp(TimeUnit::Millisecond, None))
        }
        other => return Err(format!("unsupported column type {}", other)),
    };
    Ok(values)
}

fn widen(array: &ArrayRef, to: DataType) -> std::result::Result<ColumnValues, String> {
    let converted = cast(array, &to).map_err(|e| e.to_string())?;
    if converted.data_type() != &to {
        return Err(format!("cannot convert {} to {}", array.data_type(), to));
    }
    from_arrow(&converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn floats(n: usize) -> ColumnValues {
        ColumnValues::Float((0..n).map(|i| Some(i as f64 * 0.5)).collect())
    }

    fn flat_table() -> Table {
        Table::flat(vec![
            ("id", ColumnValues::Integer(vec![Some(1), None, Some(3)])),
            ("score", ColumnValues::Float(vec![Some(0.5), Some(f64::MAX), None])),
            ("name", ColumnValues::String(vec![Some("a".into()), None, Some("ü".into())])),
            ("ok", ColumnValues::Boolean(vec![Some(true), Some(false), None])),
            ("at", ColumnValues::Timestamp(vec![Some(0), Some(1_600_000_000_000), None])),
        ])
        .unwrap()
    }

    fn read_manifest(bytes: Vec<u8>) -> String {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes)).unwrap();
        builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .unwrap()
            .iter()
            .find(|kv| kv.key == SHAPE_KEY)
            .and_then(|kv| kv.value.clone())
            .unwrap()
    }

    #[test]
    fn test_flat_round_trip_has_empty_manifest() {
        let codec = ColumnCodec::default();
        let table = flat_table();
        let bytes = codec.encode(&table).unwrap();
        assert_eq!(read_manifest(bytes.clone()), "[]");
        assert_eq!(codec.decode("flat", Bytes::from(bytes)).unwrap(), table);
    }

    #[test]
    fn test_shaped_round_trip() {
        let codec = ColumnCodec::default();
        let grid = Shape::new(vec![30, 50]);
        let table = Table::shaped(vec![
            ("x", ColumnData::shaped("x", floats(1500), grid.clone()).unwrap()),
            ("z", ColumnData::shaped("z", floats(1500), Shape::new(vec![50, 30])).unwrap()),
            ("t", ColumnData::shaped("t", floats(1500), Shape::new(vec![1500])).unwrap()),
            ("f", ColumnData::flat(floats(1500))),
        ])
        .unwrap();

        let bytes = codec.encode(&table).unwrap();
        assert_eq!(read_manifest(bytes.clone()), "[(30, 50), (50, 30), (1500,), ()]");
        let back = codec.decode("iso_grid", Bytes::from(bytes)).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.column("z").unwrap().shape(), &Shape::new(vec![50, 30]));
    }

    #[test]
    fn test_ragged_flattened_lengths_rejected() {
        let table = Table::shaped(vec![
            ("x", ColumnData::shaped("x", floats(6), Shape::new(vec![2, 3])).unwrap()),
            ("y", ColumnData::shaped("y", floats(4), Shape::new(vec![2, 2])).unwrap()),
        ])
        .unwrap();
        let err = ColumnCodec::default().encode(&table).unwrap_err();
        assert!(matches!(err, DataError::Shape(_)));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let codec = ColumnCodec::default();
        assert_eq!(codec.encode(&flat_table()).unwrap(), codec.encode(&flat_table()).unwrap());
    }

    #[test]
    fn test_truncated_bytes_are_corrupt() {
        let codec = ColumnCodec::default();
        let mut bytes = codec.encode(&flat_table()).unwrap();
        bytes.truncate(bytes.len() / 2);
        let err = codec.decode("cut", Bytes::from(bytes)).unwrap_err();
        assert!(matches!(err, DataError::CorruptArtifact { ref name, .. } if name == "cut"));
    }

    #[test]
    fn test_missing_manifest_is_corrupt() {
        let batch = RecordBatch::try_from_iter(vec![(
            "a",
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
        )])
        .unwrap();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = ColumnCodec::default().decode("plain", Bytes::from(buf)).unwrap_err();
        assert!(matches!(err, DataError::CorruptArtifact { .. }));
    }

    #[test]
    fn test_manifest_count_mismatch_is_corrupt() {
        let batch = RecordBatch::try_from_iter(vec![
            ("a", Arc::new(Float64Array::from(vec![1.0, 2.0])) as ArrayRef),
            ("b", Arc::new(Float64Array::from(vec![3.0, 4.0])) as ArrayRef),
        ])
        .unwrap();
        let props = WriterProperties::builder()
            .set_key_value_metadata(Some(vec![KeyValue {
                key: SHAPE_KEY.to_string(),
                value: Some("[(2,)]".to_string()),
            }]))
            .build();
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props)).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let err = ColumnCodec::default().decode("odd", Bytes::from(buf)).unwrap_err();
        assert!(matches!(err, DataError::CorruptArtifact { .. }));
    }

    #[test]
    fn test_file_round_trip_and_not_found() {
        let temp = TempDir::new().unwrap();
        let codec = ColumnCodec::default();
        let path = temp.path().join("sales.pqt");
        codec.write_file(&path, &flat_table()).unwrap();
        assert_eq!(codec.read_file(&path).unwrap(), flat_table());

        let err = codec.read_file(&temp.path().join("absent.pqt")).unwrap_err();
        assert!(matches!(err, DataError::NotFound(ref n) if n == "absent"));
    }
}
