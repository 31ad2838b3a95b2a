use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::temporal;

/// Element type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Integer,
    Float,
    String,
    Boolean,
    /// Milliseconds since the Unix epoch, no time zone
    Timestamp,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Integer => "int64",
            ScalarType::Float => "float64",
            ScalarType::String => "string",
            ScalarType::Boolean => "bool",
            ScalarType::Timestamp => "timestamp[ms]",
        };
        f.write_str(name)
    }
}

/// Typed, nullable storage for the elements of one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
    Timestamp(Vec<Option<i64>>),
}

/// Hashable view of a single non-null element, used as a join key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKey {
    Integer(i64),
    /// Bit pattern of the float, with `-0.0` folded onto `0.0`
    Float(u64),
    String(String),
    Boolean(bool),
    Timestamp(i64),
}

impl ColumnValues {
    /// An all-null column of the given type
    pub fn nulls(scalar_type: ScalarType, len: usize) -> Self {
        match scalar_type {
            ScalarType::Integer => ColumnValues::Integer(vec![None; len]),
            ScalarType::Float => ColumnValues::Float(vec![None; len]),
            ScalarType::String => ColumnValues::String(vec![None; len]),
            ScalarType::Boolean => ColumnValues::Boolean(vec![None; len]),
            ScalarType::Timestamp => ColumnValues::Timestamp(vec![None; len]),
        }
    }

    pub fn scalar_type(&self) -> ScalarType {
        match self {
            ColumnValues::Integer(_) => ScalarType::Integer,
            ColumnValues::Float(_) => ScalarType::Float,
            ColumnValues::String(_) => ScalarType::String,
            ColumnValues::Boolean(_) => ScalarType::Boolean,
            ColumnValues::Timestamp(_) => ScalarType::Timestamp,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::String(v) => v.len(),
            ColumnValues::Boolean(v) => v.len(),
            ColumnValues::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            ColumnValues::Integer(v) => v[idx].is_none(),
            ColumnValues::Float(v) => v[idx].is_none(),
            ColumnValues::String(v) => v[idx].is_none(),
            ColumnValues::Boolean(v) => v[idx].is_none(),
            ColumnValues::Timestamp(v) => v[idx].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&idx| self.is_null(idx)).count()
    }

    /// Gather elements by index; `None` yields a null element
    pub fn take(&self, indices: &[Option<usize>]) -> Self {
        fn gather<T: Clone>(values: &[Option<T>], indices: &[Option<usize>]) -> Vec<Option<T>> {
            indices
                .iter()
                .map(|idx| idx.and_then(|i| values[i].clone()))
                .collect()
        }

        match self {
            ColumnValues::Integer(v) => ColumnValues::Integer(gather(v, indices)),
            ColumnValues::Float(v) => ColumnValues::Float(gather(v, indices)),
            ColumnValues::String(v) => ColumnValues::String(gather(v, indices)),
            ColumnValues::Boolean(v) => ColumnValues::Boolean(gather(v, indices)),
            ColumnValues::Timestamp(v) => ColumnValues::Timestamp(gather(v, indices)),
        }
    }

    /// Element-wise `self` or else `other`; `None` if the columns disagree in type or length
    pub fn coalesce(&self, other: &Self) -> Option<Self> {
        fn pick<T: Clone>(a: &[Option<T>], b: &[Option<T>]) -> Vec<Option<T>> {
            a.iter().zip(b).map(|(a, b)| a.clone().or_else(|| b.clone())).collect()
        }

        if self.len() != other.len() {
            return None;
        }
        Some(match (self, other) {
            (ColumnValues::Integer(a), ColumnValues::Integer(b)) => {
                ColumnValues::Integer(pick(a, b))
            }
            (ColumnValues::Float(a), ColumnValues::Float(b)) => ColumnValues::Float(pick(a, b)),
            (ColumnValues::String(a), ColumnValues::String(b)) => ColumnValues::String(pick(a, b)),
            (ColumnValues::Boolean(a), ColumnValues::Boolean(b)) => {
                ColumnValues::Boolean(pick(a, b))
            }
            (ColumnValues::Timestamp(a), ColumnValues::Timestamp(b)) => {
                ColumnValues::Timestamp(pick(a, b))
            }
            _ => return None,
        })
    }

    /// First `n` elements
    pub fn head(&self, n: usize) -> Self {
        let indices: Vec<Option<usize>> = (0..n.min(self.len())).map(Some).collect();
        self.take(&indices)
    }

    /// Join key of the element at `idx`, `None` when null
    pub fn key_at(&self, idx: usize) -> Option<ScalarKey> {
        match self {
            ColumnValues::Integer(v) => v[idx].map(ScalarKey::Integer),
            ColumnValues::Float(v) => v[idx].map(|f| {
                let f = if f == 0.0 { 0.0 } else { f };
                ScalarKey::Float(f.to_bits())
            }),
            ColumnValues::String(v) => v[idx].clone().map(ScalarKey::String),
            ColumnValues::Boolean(v) => v[idx].map(ScalarKey::Boolean),
            ColumnValues::Timestamp(v) => v[idx].map(ScalarKey::Timestamp),
        }
    }

    /// Compare two elements of this column; nulls sort last
    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        fn nulls_last<T>(
            a: &Option<T>,
            b: &Option<T>,
            cmp: impl Fn(&T, &T) -> Ordering,
        ) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => cmp(a, b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }

        match self {
            ColumnValues::Integer(v) => nulls_last(&v[a], &v[b], |x, y| x.cmp(y)),
            ColumnValues::Float(v) => nulls_last(&v[a], &v[b], |x, y| x.total_cmp(y)),
            ColumnValues::String(v) => nulls_last(&v[a], &v[b], |x, y| x.cmp(y)),
            ColumnValues::Boolean(v) => nulls_last(&v[a], &v[b], |x, y| x.cmp(y)),
            ColumnValues::Timestamp(v) => nulls_last(&v[a], &v[b], |x, y| x.cmp(y)),
        }
    }

    /// Numeric view of the element, used by plotting
    pub fn as_f64(&self, idx: usize) -> Option<f64> {
        match self {
            ColumnValues::Integer(v) | ColumnValues::Timestamp(v) => v[idx].map(|i| i as f64),
            ColumnValues::Float(v) => v[idx],
            ColumnValues::Boolean(v) => v[idx].map(|b| if b { 1.0 } else { 0.0 }),
            ColumnValues::String(_) => None,
        }
    }

    /// JSON form of the element at `idx`
    ///
    /// Timestamps are written as ISO-8601 strings so that re-ingestion
    /// recognises them as temporal again.
    pub fn json_value(&self, idx: usize) -> Value {
        match self {
            ColumnValues::Integer(v) => v[idx].map(Value::from).unwrap_or(Value::Null),
            ColumnValues::Float(v) => v[idx]
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnValues::String(v) => v[idx].clone().map(Value::String).unwrap_or(Value::Null),
            ColumnValues::Boolean(v) => v[idx].map(Value::Bool).unwrap_or(Value::Null),
            ColumnValues::Timestamp(v) => v[idx]
                .and_then(temporal::format_timestamp)
                .map(Value::String)
                .unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_with_missing_indices() {
        let values = ColumnValues::Integer(vec![Some(10), None, Some(30)]);
        let taken = values.take(&[Some(2), None, Some(0), Some(1)]);
        assert_eq!(
            taken,
            ColumnValues::Integer(vec![Some(30), None, Some(10), None])
        );
        assert_eq!(taken.null_count(), 2);
    }

    #[test]
    fn test_compare_puts_nulls_last() {
        let values = ColumnValues::Float(vec![None, Some(1.5), Some(-2.0)]);
        assert_eq!(values.compare(0, 1), Ordering::Greater);
        assert_eq!(values.compare(2, 1), Ordering::Less);
    }

    #[test]
    fn test_float_keys_fold_negative_zero() {
        let values = ColumnValues::Float(vec![Some(0.0), Some(-0.0)]);
        assert_eq!(values.key_at(0), values.key_at(1));
    }

    #[test]
    fn test_coalesce() {
        let a = ColumnValues::Integer(vec![Some(1), None, None]);
        let b = ColumnValues::Integer(vec![Some(9), Some(2), None]);
        assert_eq!(
            a.coalesce(&b),
            Some(ColumnValues::Integer(vec![Some(1), Some(2), None]))
        );
        assert_eq!(a.coalesce(&ColumnValues::Float(vec![None; 3])), None);
    }
}
