//! Reshaping of flat tables before they are saved or plotted

use graphit_core::{ColumnData, ColumnValues, Table};

use crate::{DataError, Result};

/// Selector value meaning "every column" for [`limit`]
pub const ALL_COLUMNS: &str = "All Columns";

/// Name of the column managed by [`add_index`] and [`remove_index`]
pub const INDEX_COLUMN: &str = "index";

fn require_flat(table: &Table) -> Result<()> {
    if table.is_flat() {
        Ok(())
    } else {
        Err(DataError::NotTabular)
    }
}

fn rebuild(columns: impl IntoIterator<Item = (String, ColumnValues)>) -> Result<Table> {
    Ok(Table::flat(columns.into_iter().collect::<Vec<_>>())?)
}

/// Keep the first `n` rows
///
/// With no column (or [`ALL_COLUMNS`]) the whole table is cut to `n`
/// rows. With a column, the table keeps its length and that column's
/// elements past `n` become null.
pub fn limit(table: &Table, column: Option<&str>, n: usize) -> Result<Table> {
    require_flat(table)?;
    let rows = table.row_count().unwrap_or(0);

    match column.filter(|c| !c.is_empty() && *c != ALL_COLUMNS) {
        None => rebuild(
            table
                .columns()
                .map(|(name, data)| (name.to_string(), data.values().head(n))),
        ),
        Some(target) => {
            if table.column(target).is_none() {
                return Err(DataError::NotFound(target.to_string()));
            }
            let indices: Vec<Option<usize>> =
                (0..rows).map(|row| (row < n).then_some(row)).collect();
            rebuild(table.columns().map(|(name, data)| {
                let values = if name == target {
                    data.values().take(&indices)
                } else {
                    data.values().clone()
                };
                (name.to_string(), values)
            }))
        }
    }
}

/// Stable ascending sort on one column, nulls last
pub fn sort_by(table: &Table, column: &str) -> Result<Table> {
    require_flat(table)?;
    let key = table
        .column(column)
        .ok_or_else(|| DataError::NotFound(column.to_string()))?
        .values();

    let mut order: Vec<usize> = (0..key.len()).collect();
    order.sort_by(|&a, &b| key.compare(a, b));
    let indices: Vec<Option<usize>> = order.into_iter().map(Some).collect();

    rebuild(
        table
            .columns()
            .map(|(name, data)| (name.to_string(), data.values().take(&indices))),
    )
}

/// Prepend an `index` column counting rows from zero, unless one exists
pub fn add_index(table: &Table) -> Result<Table> {
    require_flat(table)?;
    let mut indexed = table.clone();
    if table.column(INDEX_COLUMN).is_some() {
        return Ok(indexed);
    }
    let rows = table.row_count().unwrap_or(0) as i64;
    let values = ColumnValues::Integer((0..rows).map(Some).collect());
    indexed.insert_column_at(0, INDEX_COLUMN.to_string(), ColumnData::flat(values))?;
    Ok(indexed)
}

pub fn remove_index(table: &Table) -> Result<Table> {
    require_flat(table)?;
    let mut trimmed = table.clone();
    trimmed.remove_column(INDEX_COLUMN);
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphit_core::Shape;
    use pretty_assertions::assert_eq;

    fn sample() -> Table {
        Table::flat(vec![
            (
                "name",
                ColumnValues::String(vec![
                    Some("c".into()),
                    None,
                    Some("a".into()),
                    Some("b".into()),
                ]),
            ),
            ("score", ColumnValues::Float(vec![Some(3.0), Some(1.0), None, Some(1.0)])),
        ])
        .unwrap()
    }

    #[test]
    fn test_limit_all_columns() {
        let limited = limit(&sample(), Some(ALL_COLUMNS), 2).unwrap();
        assert_eq!(limited.row_count(), Some(2));

        let limited = limit(&sample(), None, 10).unwrap();
        assert_eq!(limited, sample());
    }

    #[test]
    fn test_limit_one_column_nulls_tail() {
        let limited = limit(&sample(), Some("score"), 1).unwrap();
        assert_eq!(limited.row_count(), Some(4));
        assert_eq!(
            limited.column("score").unwrap().values(),
            &ColumnValues::Float(vec![Some(3.0), None, None, None])
        );
        assert_eq!(limited.column("name"), sample().column("name"));
    }

    #[test]
    fn test_sort_is_stable_with_nulls_last() {
        let sorted = sort_by(&sample(), "score").unwrap();
        assert_eq!(
            sorted.column("name").unwrap().values(),
            &ColumnValues::String(vec![None, Some("b".into()), Some("c".into()), Some("a".into())])
        );
    }

    #[test]
    fn test_index_round_trip() {
        let indexed = add_index(&sample()).unwrap();
        assert_eq!(indexed.column_names().next(), Some(INDEX_COLUMN));
        assert_eq!(
            indexed.column(INDEX_COLUMN).unwrap().values(),
            &ColumnValues::Integer(vec![Some(0), Some(1), Some(2), Some(3)])
        );
        assert_eq!(add_index(&indexed).unwrap(), indexed);
        assert_eq!(remove_index(&indexed).unwrap(), sample());
    }

    #[test]
    fn test_shaped_tables_are_rejected() {
        let grid = ColumnData::shaped(
            "z",
            ColumnValues::Float(vec![Some(0.0); 4]),
            Shape::new(vec![2, 2]),
        )
        .unwrap();
        let shaped = Table::shaped(vec![("z", grid)]).unwrap();
        assert!(matches!(sort_by(&shaped, "z"), Err(DataError::NotTabular)));
        assert!(matches!(add_index(&shaped), Err(DataError::NotTabular)));
    }

    #[test]
    fn test_unknown_column() {
        assert!(matches!(sort_by(&sample(), "nope"), Err(DataError::NotFound(_))));
        assert!(matches!(limit(&sample(), Some("nope"), 1), Err(DataError::NotFound(_))));
    }
}
