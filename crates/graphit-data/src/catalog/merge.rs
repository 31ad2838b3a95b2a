//! Outer join of two flat tables

use ahash::AHashMap;
use graphit_core::{ColumnValues, ScalarKey, Table};

pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

/// Full outer join on `on`
///
/// Rows come out in left order, each left row repeated once per matching
/// right row, followed by the right rows that matched nothing. Returns
/// `None` when either table is shaped, lacks the column, or the key
/// columns have different types.
pub fn outer_join(left: &Table, right: &Table, on: &str) -> Option<Table> {
    if !left.is_flat() || !right.is_flat() {
        return None;
    }
    let left_key = left.column(on)?.values();
    let right_key = right.column(on)?.values();
    if left_key.scalar_type() != right_key.scalar_type() {
        return None;
    }

    let mut right_rows: AHashMap<ScalarKey, Vec<usize>> = AHashMap::new();
    for row in 0..right_key.len() {
        if let Some(key) = right_key.key_at(row) {
            right_rows.entry(key).or_default().push(row);
        }
    }

    let mut left_take = Vec::with_capacity(left_key.len());
    let mut right_take = Vec::with_capacity(left_key.len());
    let mut matched = vec![false; right_key.len()];
    for row in 0..left_key.len() {
        match left_key.key_at(row).and_then(|key| right_rows.get(&key)) {
            Some(rows) => {
                for &r in rows {
                    left_take.push(Some(row));
                    right_take.push(Some(r));
                    matched[r] = true;
                }
            }
            None => {
                left_take.push(Some(row));
                right_take.push(None);
            }
        }
    }
    for (r, _) in matched.iter().enumerate().filter(|(_, m)| !**m) {
        left_take.push(None);
        right_take.push(Some(r));
    }

    let mut columns: Vec<(String, ColumnValues)> =
        Vec::with_capacity(left.num_columns() + right.num_columns());
    for (name, data) in left.columns() {
        let values = data.values().take(&left_take);
        if name == on {
            columns.push((name.to_string(), values.coalesce(&right_key.take(&right_take))?));
        } else if right.column(name).is_some() {
            columns.push((format!("{}{}", name, LEFT_SUFFIX), values));
        } else {
            columns.push((name.to_string(), values));
        }
    }
    for (name, data) in right.columns() {
        if name == on {
            continue;
        }
        let values = data.values().take(&right_take);
        if left.column(name).is_some() {
            columns.push((format!("{}{}", name, RIGHT_SUFFIX), values));
        } else {
            columns.push((name.to_string(), values));
        }
    }

    match Table::flat(columns) {
        Ok(table) => Some(table),
        Err(err) => {
            tracing::warn!("Merged columns collide: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphit_core::{ColumnData, Shape};
    use pretty_assertions::assert_eq;

    fn ids(values: &[i64]) -> ColumnValues {
        ColumnValues::Integer(values.iter().copied().map(Some).collect())
    }

    #[test]
    fn test_outer_join_fills_nulls() {
        let left = Table::flat(vec![
            ("id", ids(&[1, 2, 3])),
            (
                "a",
                ColumnValues::String(vec![
                    Some("one".into()),
                    Some("two".into()),
                    Some("three".into()),
                ]),
            ),
        ])
        .unwrap();
        let right = Table::flat(vec![("id", ids(&[2, 3, 4])), ("b", ids(&[20, 30, 40]))]).unwrap();

        let merged = outer_join(&left, &right, "id").unwrap();
        assert_eq!(merged.column("id").unwrap().values(), &ids(&[1, 2, 3, 4]));
        assert_eq!(
            merged.column("b").unwrap().values(),
            &ColumnValues::Integer(vec![None, Some(20), Some(30), Some(40)])
        );
        assert_eq!(
            merged.column("a").unwrap().values(),
            &ColumnValues::String(vec![
                Some("one".into()),
                Some("two".into()),
                Some("three".into()),
                None
            ])
        );
    }

    #[test]
    fn test_overlapping_names_get_suffixes() {
        let left = Table::flat(vec![("id", ids(&[1])), ("v", ids(&[1]))]).unwrap();
        let right = Table::flat(vec![("id", ids(&[1])), ("v", ids(&[2]))]).unwrap();
        let merged = outer_join(&left, &right, "id").unwrap();
        assert_eq!(merged.column_names().collect::<Vec<_>>(), vec!["id", "v_x", "v_y"]);
    }

    #[test]
    fn test_duplicate_keys_multiply() {
        let left = Table::flat(vec![("id", ids(&[1, 1]))]).unwrap();
        let right = Table::flat(vec![("id", ids(&[1, 1])), ("w", ids(&[5, 6]))]).unwrap();
        let merged = outer_join(&left, &right, "id").unwrap();
        assert_eq!(merged.row_count(), Some(4));
    }

    #[test]
    fn test_incompatible_inputs() {
        let flat = Table::flat(vec![("id", ids(&[1, 2]))]).unwrap();
        let grid = ColumnData::shaped("id", ids(&[1, 2, 3, 4]), Shape::new(vec![2, 2])).unwrap();
        let shaped = Table::shaped(vec![("id", grid)]).unwrap();
        assert!(outer_join(&flat, &shaped, "id").is_none());
        assert!(outer_join(&flat, &flat, "missing").is_none());

        let text = Table::flat(vec![("id", ColumnValues::String(vec![Some("1".into())]))]).unwrap();
        assert!(outer_join(&flat, &text, "id").is_none());
    }
}
