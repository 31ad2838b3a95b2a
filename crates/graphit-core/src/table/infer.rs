//! Scalar type inference for text input

use super::temporal::parse_timestamp;
use super::values::{ColumnValues, ScalarType};

/// Infer the scalar type of a single non-null text value
///
/// Checked in order: boolean, integer, float, timestamp, string.
pub fn infer_scalar_type(value: &str) -> ScalarType {
    let value = value.trim();
    if parse_bool(value).is_some() {
        ScalarType::Boolean
    } else if value.parse::<i64>().is_ok() {
        ScalarType::Integer
    } else if value.parse::<f64>().is_ok() {
        ScalarType::Float
    } else if parse_timestamp(value).is_some() {
        ScalarType::Timestamp
    } else {
        ScalarType::String
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Accumulates text cells into a typed column
///
/// Cells that do not parse as the column's type become null; the type
/// is never widened after it was chosen.
pub struct ColumnBuilder {
    values: ColumnValues,
}

impl ColumnBuilder {
    pub fn new(scalar_type: ScalarType) -> Self {
        Self {
            values: ColumnValues::nulls(scalar_type, 0),
        }
    }

    pub fn with_capacity(scalar_type: ScalarType, capacity: usize) -> Self {
        let values = match scalar_type {
            ScalarType::Integer => ColumnValues::Integer(Vec::with_capacity(capacity)),
            ScalarType::Float => ColumnValues::Float(Vec::with_capacity(capacity)),
            ScalarType::String => ColumnValues::String(Vec::with_capacity(capacity)),
            ScalarType::Boolean => ColumnValues::Boolean(Vec::with_capacity(capacity)),
            ScalarType::Timestamp => ColumnValues::Timestamp(Vec::with_capacity(capacity)),
        };
        Self { values }
    }

    pub fn push(&mut self, cell: Option<&str>) {
        match &mut self.values {
            ColumnValues::Integer(v) => v.push(cell.and_then(|c| c.trim().parse().ok())),
            ColumnValues::Float(v) => v.push(cell.and_then(|c| c.trim().parse().ok())),
            ColumnValues::String(v) => v.push(cell.map(str::to_string)),
            ColumnValues::Boolean(v) => v.push(cell.and_then(|c| parse_bool(c.trim()))),
            ColumnValues::Timestamp(v) => v.push(cell.and_then(parse_timestamp)),
        }
    }

    pub fn finish(self) -> ColumnValues {
        self.values
    }
}

/// Build a typed column from text cells, typed by the first non-null cell
///
/// An integer column whose later cells hold fractional numbers becomes a
/// float column. A column without any non-null cell is a float column of
/// nulls.
pub fn build_column<S: AsRef<str>>(cells: &[Option<S>]) -> ColumnValues {
    let mut scalar_type = cells
        .iter()
        .find_map(|cell| cell.as_ref())
        .map(|cell| infer_scalar_type(cell.as_ref()))
        .unwrap_or(ScalarType::Float);

    if scalar_type == ScalarType::Integer && needs_float(cells) {
        scalar_type = ScalarType::Float;
    }

    let mut builder = ColumnBuilder::with_capacity(scalar_type, cells.len());
    for cell in cells {
        builder.push(cell.as_ref().map(|c| c.as_ref()));
    }
    builder.finish()
}

fn needs_float<S: AsRef<str>>(cells: &[Option<S>]) -> bool {
    let mut saw_fraction = false;
    for cell in cells.iter().flatten() {
        let cell = cell.as_ref().trim();
        if cell.parse::<i64>().is_ok() {
            continue;
        }
        if cell.parse::<f64>().is_ok() {
            saw_fraction = true;
        } else {
            return false;
        }
    }
    saw_fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_order() {
        assert_eq!(infer_scalar_type("TRUE"), ScalarType::Boolean);
        assert_eq!(infer_scalar_type("42"), ScalarType::Integer);
        assert_eq!(infer_scalar_type("4.2e1"), ScalarType::Float);
        assert_eq!(infer_scalar_type("2024-03-01 10:00:00"), ScalarType::Timestamp);
        assert_eq!(infer_scalar_type("north"), ScalarType::String);
    }

    #[test]
    fn test_first_non_null_decides() {
        let cells = vec![None, Some("7"), Some("7.5"), Some("x")];
        let column = build_column(&cells);
        assert_eq!(column, ColumnValues::Integer(vec![None, Some(7), None, None]));
    }

    #[test]
    fn test_integer_column_promotes_to_float() {
        let cells = vec![Some("1"), Some("2.5"), None];
        let column = build_column(&cells);
        assert_eq!(column, ColumnValues::Float(vec![Some(1.0), Some(2.5), None]));
    }

    #[test]
    fn test_all_null_column_is_float() {
        let cells: Vec<Option<&str>> = vec![None, None];
        assert_eq!(build_column(&cells), ColumnValues::Float(vec![None, None]));
    }
}
