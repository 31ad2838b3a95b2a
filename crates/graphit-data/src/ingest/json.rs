//! Tabular JSON sources

use std::path::Path;

use graphit_core::table::json::from_tabular;
use graphit_core::Table;

use super::encoding::decode_text;
use crate::Result;

/// Read records (`[{..}, ..]`) or columns (`{col: {row: v}}`) into a flat table
pub fn read_json(path: &Path, encoding: Option<&str>) -> Result<Table> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes, encoding);
    let value: serde_json::Value = serde_json::from_str(&text)?;
    Ok(from_tabular(&value)?)
}
