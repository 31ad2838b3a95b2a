//! Spreadsheet sources (first sheet only)

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use graphit_core::table::json::column_from_json;
use graphit_core::table::temporal::format_timestamp;
use graphit_core::Table;
use serde_json::Value;

use super::unique_headers;
use crate::config::NullConfig;
use crate::{DataError, Result};

/// Days between the spreadsheet epoch (1899-12-30) and 1970-01-01
const EPOCH_OFFSET_DAYS: f64 = 25_569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub fn read_spreadsheet(path: &Path, nulls: &NullConfig) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DataError::Spreadsheet("workbook has no sheets".to_string()))??;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => unique_headers(header.iter().map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        })),
        None => return Ok(Table::new()),
    };

    let mut cells: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(row.get(idx).map(|cell| cell_value(cell, nulls)).unwrap_or(Value::Null));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, column)| {
            let refs: Vec<&Value> = column.iter().collect();
            (name, column_from_json(&refs))
        })
        .collect();
    Ok(Table::flat(columns)?)
}

fn cell_value(cell: &Data, nulls: &NullConfig) -> Value {
    match cell {
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => match nulls.clean(s) {
            Some(s) => Value::String(s.to_string()),
            None => Value::Null,
        },
        Data::DateTime(dt) => format_timestamp(serial_to_millis(dt.as_f64()))
            .map(Value::String)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) | Data::Empty => Value::Null,
    }
}

fn serial_to_millis(serial: f64) -> i64 {
    ((serial - EPOCH_OFFSET_DAYS) * MILLIS_PER_DAY).round() as i64
}
