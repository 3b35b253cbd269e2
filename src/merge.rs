use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::error::{JoinSide, MergeError};
use crate::table::{Column, Table};
use crate::types::{JoinHow, MergeKeySet, Value};

/// Suffixes applied to non-key columns present on both sides of a join
pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

type KeyTuple = Vec<Value>;

/// Join `right` into `left` on `keys`.
///
/// Both sides must be one-to-one on the key columns, and a key column must
/// not hold numbers on one side and text on the other. Output rows are sorted
/// ascending by key tuple. Columns keep the left table's order followed by
/// the right table's non-key columns.
pub fn join(
    left: &Table,
    right: &Table,
    keys: &MergeKeySet,
    how: JoinHow,
) -> Result<Table, MergeError> {
    let left_keys = key_positions(left, keys, JoinSide::Left)?;
    let right_keys = key_positions(right, keys, JoinSide::Right)?;
    check_key_types(left, &left_keys, right, &right_keys)?;

    let left_index = index_rows(left, &left_keys, JoinSide::Left)?;
    let right_index = index_rows(right, &right_keys, JoinSide::Right)?;

    // BTreeMap keeps the union of key tuples in ascending order
    let mut matched: BTreeMap<&KeyTuple, (Option<usize>, Option<usize>)> = BTreeMap::new();
    for (key, &row) in &left_index {
        matched.entry(key).or_default().0 = Some(row);
    }
    for (key, &row) in &right_index {
        matched.entry(key).or_default().1 = Some(row);
    }

    let rows: Vec<(Option<usize>, Option<usize>)> = matched
        .into_values()
        .filter(|(l, r)| how.keeps(l.is_some(), r.is_some()))
        .collect();

    let right_key_set: HashSet<usize> = right_keys.iter().copied().collect();
    let right_names: HashSet<&str> = right
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !right_key_set.contains(idx))
        .map(|(_, c)| c.name.as_str())
        .collect();
    let left_key_set: HashSet<usize> = left_keys.iter().copied().collect();
    let left_names: HashSet<&str> = left
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !left_key_set.contains(idx))
        .map(|(_, c)| c.name.as_str())
        .collect();

    let mut columns = Vec::with_capacity(left.column_count() + right.column_count());

    for (idx, column) in left.columns().iter().enumerate() {
        if let Some(key_pos) = left_keys.iter().position(|&k| k == idx) {
            let right_column = &right.columns()[right_keys[key_pos]];
            let values = rows
                .iter()
                .map(|(l, r)| match (l, r) {
                    (Some(l), _) => column.values[*l].clone(),
                    (None, Some(r)) => right_column.values[*r].clone(),
                    (None, None) => Value::Missing,
                })
                .collect();
            columns.push(Column::new(column.name.clone(), values));
            continue;
        }

        let name = if right_names.contains(column.name.as_str()) {
            format!("{}{}", column.name, LEFT_SUFFIX)
        } else {
            column.name.clone()
        };
        columns.push(Column::new(name, take(&column.values, rows.iter().map(|(l, _)| *l))));
    }

    for (idx, column) in right.columns().iter().enumerate() {
        if right_key_set.contains(&idx) {
            continue;
        }
        let name = if left_names.contains(column.name.as_str()) {
            format!("{}{}", column.name, RIGHT_SUFFIX)
        } else {
            column.name.clone()
        };
        columns.push(Column::new(name, take(&column.values, rows.iter().map(|(_, r)| *r))));
    }

    debug!(
        rows = rows.len(),
        columns = columns.len(),
        ?how,
        "joined tables"
    );

    Table::new(columns).map_err(|e| MergeError::InvalidTable(e.to_string()))
}

/// One fold step of the merge accumulator.
///
/// The first table becomes the accumulator as-is; its keys are only checked
/// once it takes part in a join. On a failed join the accumulator is
/// returned unchanged together with the error.
pub fn merge_step(
    acc: Option<Table>,
    next: Table,
    keys: &MergeKeySet,
    how: JoinHow,
) -> (Option<Table>, Option<MergeError>) {
    match acc {
        None => (Some(next), None),
        Some(current) => match join(&current, &next, keys, how) {
            Ok(merged) => (Some(merged), None),
            Err(e) => (Some(current), Some(e)),
        },
    }
}

/// Owns the in-progress merged table for one batch run
#[derive(Debug)]
pub struct Accumulator {
    keys: MergeKeySet,
    how: JoinHow,
    table: Option<Table>,
    contributions: usize,
}

impl Accumulator {
    pub fn new(keys: MergeKeySet, how: JoinHow) -> Self {
        Self {
            keys,
            how,
            table: None,
            contributions: 0,
        }
    }

    /// Fold `next` into the accumulator, leaving it untouched on error
    pub fn contribute(&mut self, next: Table) -> Result<(), MergeError> {
        let (table, error) = merge_step(self.table.take(), next, &self.keys, self.how);
        self.table = table;
        match error {
            Some(e) => Err(e),
            None => {
                self.contributions += 1;
                Ok(())
            }
        }
    }

    #[cfg(test)]
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn into_table(self) -> Option<Table> {
        self.table
    }

    /// Number of tables successfully folded in
    pub fn contributions(&self) -> usize {
        self.contributions
    }
}

fn key_positions(
    table: &Table,
    keys: &MergeKeySet,
    side: JoinSide,
) -> Result<Vec<usize>, MergeError> {
    keys.iter()
        .map(|key| {
            table.column_index(key).ok_or_else(|| MergeError::MissingKey {
                key: key.to_string(),
                side,
            })
        })
        .collect()
}

#[derive(Default)]
struct KeyKinds {
    numbers: bool,
    text: bool,
}

fn key_kinds(values: &[Value]) -> KeyKinds {
    let mut kinds = KeyKinds::default();
    for value in values {
        match value {
            Value::Number(_) => kinds.numbers = true,
            Value::Text(_) => kinds.text = true,
            Value::Missing => {}
        }
    }
    kinds
}

/// Numeric and text keys never compare equal, so a mixed pairing would
/// silently produce no matches.
fn check_key_types(
    left: &Table,
    left_keys: &[usize],
    right: &Table,
    right_keys: &[usize],
) -> Result<(), MergeError> {
    for (&l, &r) in left_keys.iter().zip(right_keys) {
        let left_column = &left.columns()[l];
        let lk = key_kinds(&left_column.values);
        let rk = key_kinds(&right.columns()[r].values);
        if (lk.numbers && rk.text) || (lk.text && rk.numbers) {
            return Err(MergeError::KeyTypeMismatch {
                key: left_column.name.clone(),
            });
        }
    }
    Ok(())
}

fn index_rows(
    table: &Table,
    key_columns: &[usize],
    side: JoinSide,
) -> Result<BTreeMap<KeyTuple, usize>, MergeError> {
    let mut index = BTreeMap::new();
    for row in 0..table.row_count() {
        let key: KeyTuple = key_columns
            .iter()
            .map(|&c| table.columns()[c].values[row].clone())
            .collect();
        if index.contains_key(&key) {
            return Err(MergeError::DuplicateKeys {
                side,
                key: format_key(&key),
            });
        }
        index.insert(key, row);
    }
    Ok(index)
}

fn take(values: &[Value], positions: impl Iterator<Item = Option<usize>>) -> Vec<Value> {
    positions
        .map(|pos| pos.map(|p| values[p].clone()).unwrap_or(Value::Missing))
        .collect()
}

fn format_key(key: &[Value]) -> String {
    let parts: Vec<String> = key
        .iter()
        .map(|v| match v {
            Value::Missing => "<missing>".to_string(),
            other => other.to_string(),
        })
        .collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> MergeKeySet {
        MergeKeySet::new(["ID"]).unwrap()
    }

    fn keyed(ids: &[f64], column: &str) -> Table {
        Table::new(vec![
            Column::new("ID", ids.iter().map(|&i| Value::from(i)).collect()),
            Column::new(column, ids.iter().map(|&i| Value::from(i * 10.0)).collect()),
        ])
        .unwrap()
    }

    fn ids(table: &Table) -> Vec<Value> {
        table.column("ID").unwrap().values.clone()
    }

    #[test]
    fn test_outer_fold_of_three_tables() {
        let mut acc = Accumulator::new(keys(), JoinHow::Outer);
        acc.contribute(keyed(&[3.0, 1.0, 2.0], "a")).unwrap();
        acc.contribute(keyed(&[2.0, 3.0, 4.0], "b")).unwrap();
        acc.contribute(keyed(&[3.0, 4.0, 5.0], "c")).unwrap();

        let table = acc.table().unwrap();
        assert_eq!(
            ids(table),
            (1..=5).map(|i| Value::from(i as f64)).collect::<Vec<_>>()
        );
        assert_eq!(table.column_names(), vec!["ID", "a", "b", "c"]);
        let a = &table.column("a").unwrap().values;
        assert_eq!(a[0], Value::from(10.0));
        assert!(a[3].is_missing());
        assert!(a[4].is_missing());
        let c = &table.column("c").unwrap().values;
        assert!(c[0].is_missing());
        assert_eq!(c[2], Value::from(30.0));
        assert_eq!(acc.contributions(), 3);
    }

    #[test]
    fn test_inner_join() {
        let left = keyed(&[1.0, 2.0, 3.0], "a");
        let right = keyed(&[2.0, 3.0, 4.0], "b");
        let merged = join(&left, &right, &keys(), JoinHow::Inner).unwrap();
        assert_eq!(ids(&merged), vec![Value::from(2.0), Value::from(3.0)]);
    }

    #[test]
    fn test_left_and_right_join() {
        let left = keyed(&[1.0, 2.0], "a");
        let right = keyed(&[2.0, 3.0], "b");

        let merged = join(&left, &right, &keys(), JoinHow::Left).unwrap();
        assert_eq!(ids(&merged), vec![Value::from(1.0), Value::from(2.0)]);
        assert!(merged.column("b").unwrap().values[0].is_missing());

        let merged = join(&left, &right, &keys(), JoinHow::Right).unwrap();
        assert_eq!(ids(&merged), vec![Value::from(2.0), Value::from(3.0)]);
        assert!(merged.column("a").unwrap().values[1].is_missing());
    }

    #[test]
    fn test_duplicate_key_discarded() {
        let mut acc = Accumulator::new(keys(), JoinHow::Outer);
        acc.contribute(keyed(&[1.0, 2.0], "a")).unwrap();
        let before = acc.table().cloned();

        let err = acc.contribute(keyed(&[2.0, 2.0], "b")).unwrap_err();
        assert!(matches!(err, MergeError::DuplicateKeys { side: JoinSide::Right, .. }));
        assert_eq!(acc.table().cloned(), before);
        assert_eq!(acc.contributions(), 1);
    }

    #[test]
    fn test_duplicate_key_on_left_side() {
        let left = keyed(&[1.0, 1.0], "a");
        let err = join(&left, &keyed(&[1.0], "b"), &keys(), JoinHow::Outer).unwrap_err();
        assert_eq!(
            err,
            MergeError::DuplicateKeys {
                side: JoinSide::Left,
                key: "(1)".to_string()
            }
        );
    }

    #[test]
    fn test_missing_key_column() {
        let no_key = Table::new(vec![Column::new("x", vec![Value::from(1.0)])]).unwrap();
        let first = Some(keyed(&[1.0], "a"));
        let (acc, err) = merge_step(first, no_key.clone(), &keys(), JoinHow::Outer);
        assert!(matches!(err, Some(MergeError::MissingKey { side: JoinSide::Right, .. })));
        assert_eq!(acc, Some(keyed(&[1.0], "a")));

        // the first table is taken without looking at its columns
        let (acc, err) = merge_step(None, no_key.clone(), &keys(), JoinHow::Outer);
        assert!(err.is_none());
        assert_eq!(acc, Some(no_key));
    }

    #[test]
    fn test_first_table_with_duplicates_kept_until_next_join() {
        let mut acc = Accumulator::new(keys(), JoinHow::Outer);
        acc.contribute(keyed(&[1.0, 1.0], "a")).unwrap();
        assert_eq!(acc.table().cloned(), Some(keyed(&[1.0, 1.0], "a")));
        assert_eq!(acc.contributions(), 1);

        let err = acc.contribute(keyed(&[1.0, 2.0], "b")).unwrap_err();
        assert!(matches!(err, MergeError::DuplicateKeys { side: JoinSide::Left, .. }));
        assert_eq!(acc.table().cloned(), Some(keyed(&[1.0, 1.0], "a")));
        assert_eq!(acc.contributions(), 1);
    }

    #[test]
    fn test_numeric_and_text_keys_rejected() {
        let left = keyed(&[1.0, 2.0], "a");
        let right = Table::new(vec![
            Column::new("ID", vec![Value::from("1"), Value::Missing]),
            Column::new("b", vec![Value::from(5.0), Value::from(6.0)]),
        ])
        .unwrap();

        let err = join(&left, &right, &keys(), JoinHow::Outer).unwrap_err();
        assert_eq!(
            err,
            MergeError::KeyTypeMismatch {
                key: "ID".to_string()
            }
        );

        let mut acc = Accumulator::new(keys(), JoinHow::Outer);
        acc.contribute(left.clone()).unwrap();
        assert!(acc.contribute(right).is_err());
        assert_eq!(acc.table().cloned(), Some(left));
    }

    #[test]
    fn test_all_missing_key_column_joins_with_numbers() {
        let left = keyed(&[1.0], "a");
        let right = Table::new(vec![
            Column::new("ID", vec![Value::Missing]),
            Column::new("b", vec![Value::from("x")]),
        ])
        .unwrap();

        let merged = join(&left, &right, &keys(), JoinHow::Outer).unwrap();
        assert_eq!(ids(&merged), vec![Value::from(1.0), Value::Missing]);
    }

    #[test]
    fn test_first_step_takes_table() {
        let (acc, err) = merge_step(None, keyed(&[2.0, 1.0], "a"), &keys(), JoinHow::Inner);
        assert!(err.is_none());
        assert_eq!(acc, Some(keyed(&[2.0, 1.0], "a")));
    }

    #[test]
    fn test_overlapping_columns_suffixed() {
        let left = keyed(&[1.0], "score");
        let right = keyed(&[1.0], "score");
        let merged = join(&left, &right, &keys(), JoinHow::Outer).unwrap();
        assert_eq!(merged.column_names(), vec!["ID", "score_x", "score_y"]);
    }

    #[test]
    fn test_composite_keys_sorted() {
        let keys = MergeKeySet::new(["ID", "VISIT"]).unwrap();
        let left = Table::new(vec![
            Column::new("ID", vec![Value::from(2.0), Value::from(1.0), Value::from(1.0)]),
            Column::new("VISIT", vec![Value::from("a"), Value::from("b"), Value::from("a")]),
            Column::new("x", vec![Value::from(1.0), Value::from(2.0), Value::from(3.0)]),
        ])
        .unwrap();
        let right = Table::new(vec![
            Column::new("VISIT", vec![Value::from("b")]),
            Column::new("ID", vec![Value::from(1.0)]),
            Column::new("y", vec![Value::from(9.0)]),
        ])
        .unwrap();

        let merged = join(&left, &right, &keys, JoinHow::Outer).unwrap();
        assert_eq!(merged.column_names(), vec!["ID", "VISIT", "x", "y"]);
        assert_eq!(
            merged.column("VISIT").unwrap().values,
            vec![Value::from("a"), Value::from("b"), Value::from("a")]
        );
        assert_eq!(
            ids(&merged),
            vec![Value::from(1.0), Value::from(1.0), Value::from(2.0)]
        );
        assert_eq!(merged.column("y").unwrap().values[1], Value::from(9.0));
    }

    #[test]
    fn test_right_only_rows_take_right_keys() {
        let left = keyed(&[1.0], "a");
        let right = keyed(&[5.0], "b");
        let merged = join(&left, &right, &keys(), JoinHow::Outer).unwrap();
        assert_eq!(ids(&merged), vec![Value::from(1.0), Value::from(5.0)]);
    }
}
