//! Delimited text sources

use std::path::Path;

use csv::ReaderBuilder;
use graphit_core::table::infer::build_column;
use graphit_core::Table;

use super::encoding::decode_text;
use super::unique_headers;
use crate::config::NullConfig;
use crate::Result;

/// Read a CSV file with a header row into a flat table
pub fn read_csv(path: &Path, encoding: Option<&str>, nulls: &NullConfig) -> Result<Table> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes, encoding);
    parse_csv(&text, nulls)
}

pub fn parse_csv(text: &str, nulls: &NullConfig) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = unique_headers(reader.headers()?.iter().map(str::to_string));
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for result in reader.records() {
        let record = result?;
        for (idx, column) in cells.iter_mut().enumerate() {
            let cell = record.get(idx).and_then(|c| nulls.clean(c)).map(str::to_string);
            column.push(cell);
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, column)| (name, build_column(&column)))
        .collect();
    Ok(Table::flat(columns)?)
}
