//! JSON views of a table
//!
//! Flat tables travel as row-oriented records, shaped tables as a map of
//! column name to nested arrays.

use serde_json::{Map, Value};

use super::temporal::parse_timestamp;
use super::{ColumnData, ColumnValues, Shape, Table};
use crate::{CoreError, Result};

/// Row-oriented records: `[{"col": value, ...}, ...]`
pub fn to_records(table: &Table) -> Value {
    let rows = table.row_count().unwrap_or(0);
    let records = (0..rows)
        .map(|row| {
            let record: Map<String, Value> = table
                .columns()
                .map(|(name, data)| (name.to_string(), data.values().json_value(row)))
                .collect();
            Value::Object(record)
        })
        .collect();
    Value::Array(records)
}

/// Map of column name to nested arrays following each column's shape
pub fn to_nested(table: &Table) -> Value {
    let columns: Map<String, Value> = table
        .columns()
        .map(|(name, data)| (name.to_string(), nest(data)))
        .collect();
    Value::Object(columns)
}

fn nest(data: &ColumnData) -> Value {
    fn build(values: &ColumnValues, dims: &[usize], offset: usize, strides: &[usize]) -> Value {
        match dims {
            [] => values.json_value(offset),
            [len, rest @ ..] => Value::Array(
                (0..*len)
                    .map(|i| build(values, rest, offset + i * strides[0], &strides[1..]))
                    .collect(),
            ),
        }
    }

    let shape = if data.shape().is_scalar() {
        Shape::new(vec![data.len()])
    } else {
        data.shape().clone()
    };
    build(data.values(), shape.dims(), 0, &shape.strides())
}

/// Parse tabular JSON into a flat table
///
/// Accepts an array of record objects, or an object of columns where each
/// column is either an array of values or an object keyed by row label.
pub fn from_tabular(value: &Value) -> Result<Table> {
    match value {
        Value::Array(records) => from_record_array(records),
        Value::Object(columns) => from_column_object(columns),
        _ => Err(CoreError::Snapshot(
            "expected an array of records or an object of columns".to_string(),
        )),
    }
}

fn from_record_array(records: &[Value]) -> Result<Table> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        let record = record
            .as_object()
            .ok_or_else(|| CoreError::Snapshot("record is not an object".to_string()))?;
        for key in record.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let cells: Vec<&Value> = records
                .iter()
                .map(|r| r.get(&name).unwrap_or(&Value::Null))
                .collect();
            let values = column_from_json(&cells);
            (name, values)
        })
        .collect();
    Table::flat(columns)
}

fn from_column_object(columns: &Map<String, Value>) -> Result<Table> {
    let mut built = Vec::with_capacity(columns.len());
    for (name, column) in columns {
        let cells: Vec<&Value> = match column {
            Value::Array(cells) => cells.iter().collect(),
            Value::Object(by_label) => by_label.values().collect(),
            _ => {
                return Err(CoreError::Snapshot(format!(
                    "column '{}' is neither an array nor an object",
                    name
                )))
            }
        };
        built.push((name.clone(), column_from_json(&cells)));
    }
    Table::flat(built)
}

/// Parse a map of column name to nested arrays into a shaped table
pub fn from_nested(value: &Value) -> Result<Table> {
    let columns = value
        .as_object()
        .ok_or_else(|| CoreError::Snapshot("expected an object of arrays".to_string()))?;

    let mut built = Vec::with_capacity(columns.len());
    for (name, column) in columns {
        let mut dims = Vec::new();
        let mut probe = column;
        while let Value::Array(items) = probe {
            dims.push(items.len());
            match items.first() {
                Some(first) => probe = first,
                None => break,
            }
        }
        if dims.is_empty() {
            return Err(CoreError::Snapshot(format!("column '{}' is not an array", name)));
        }

        let mut leaves = Vec::with_capacity(dims.iter().product());
        flatten(column, &dims, &mut leaves)
            .ok_or_else(|| CoreError::Snapshot(format!("column '{}' is ragged", name)))?;

        let values = column_from_json(&leaves);
        built.push((name.clone(), ColumnData::shaped(name, values, Shape::new(dims))?));
    }
    Table::shaped(built)
}

fn flatten<'a>(value: &'a Value, dims: &[usize], out: &mut Vec<&'a Value>) -> Option<()> {
    match dims {
        [] => {
            if value.is_array() {
                return None;
            }
            out.push(value);
            Some(())
        }
        [len, rest @ ..] => {
            let items = value.as_array()?;
            if items.len() != *len {
                return None;
            }
            items.iter().try_for_each(|item| flatten(item, rest, out))
        }
    }
}

/// Type a column of JSON scalars by its first non-null value
///
/// Numbers form an integer column unless any of them is fractional.
/// Strings that parse as timestamps form a temporal column.
pub fn column_from_json(cells: &[&Value]) -> ColumnValues {
    let first = cells.iter().find(|v| !v.is_null());
    match first {
        Some(Value::Bool(_)) => ColumnValues::Boolean(cells.iter().map(|v| v.as_bool()).collect()),
        Some(Value::Number(_)) => {
            let integral = cells
                .iter()
                .filter(|v| v.is_number())
                .all(|v| v.as_i64().is_some());
            if integral {
                ColumnValues::Integer(cells.iter().map(|v| v.as_i64()).collect())
            } else {
                ColumnValues::Float(cells.iter().map(|v| v.as_f64()).collect())
            }
        }
        Some(Value::String(s)) if parse_timestamp(s).is_some() => ColumnValues::Timestamp(
            cells
                .iter()
                .map(|v| v.as_str().and_then(parse_timestamp))
                .collect(),
        ),
        Some(Value::String(_)) => ColumnValues::String(
            cells
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect(),
        ),
        Some(_) => ColumnValues::String(
            cells
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect(),
        ),
        None => ColumnValues::Float(vec![None; cells.len()]),
    }
}
