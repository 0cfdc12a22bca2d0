use crate::constants::DEFAULT_FILL_COLUMNS;
use crate::error::{EtlError, Result};
use crate::table::{float_cell, Cell, Table};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Full outer join of tagged tables on `key`, folded left to right.
///
/// The first join suffixes colliding non-key columns with both sources'
/// tags (`_csv`, `_json`). Every later join keeps the accumulated names and
/// suffixes only the incoming table's collisions (`_google`).
///
/// Fails if any input lacks the key column.
pub fn merge_sources(tables: Vec<(String, Table)>, key: &str) -> Result<Table> {
    for (tag, table) in &tables {
        if !table.has_column(key) {
            return Err(EtlError::MissingColumn {
                column: key.to_string(),
                source_label: format!("source '{}'", tag),
            });
        }
    }

    let mut iter = tables.into_iter();
    let Some((first_tag, mut merged)) = iter.next() else {
        return Ok(Table::empty());
    };

    for (i, (tag, table)) in iter.enumerate() {
        let left_suffix = if i == 0 { format!("_{}", first_tag) } else { String::new() };
        merged = outer_join(&merged, &table, key, &left_suffix, &format!("_{}", tag));
    }

    info!(rows = merged.len(), "Merged all datasets on '{}'", key);
    Ok(merged)
}

/// Replace nulls in the fixed numeric columns with zero. Other columns keep
/// their nulls; fill columns the table lacks are ignored.
pub fn fill_defaults(mut table: Table) -> Table {
    for column in DEFAULT_FILL_COLUMNS {
        table.map_column(column, |cell| {
            if cell.is_null() {
                float_cell(0.0)
            } else {
                cell.clone()
            }
        });
    }
    table
}

/// Both tables must contain `key`.
fn outer_join(left: &Table, right: &Table, key: &str, left_suffix: &str, right_suffix: &str) -> Table {
    let (Some(lk), Some(rk)) = (left.column_index(key), right.column_index(key)) else {
        return Table::empty();
    };

    let collides = |name: &str, other: &Table| name != key && other.has_column(name);

    let mut columns: Vec<String> = left
        .columns()
        .iter()
        .map(|c| {
            if collides(c.as_str(), right) {
                format!("{}{}", c, left_suffix)
            } else {
                c.clone()
            }
        })
        .collect();
    let right_cols: Vec<usize> = (0..right.column_count()).filter(|&i| i != rk).collect();
    for &i in &right_cols {
        let c = &right.columns()[i];
        if collides(c.as_str(), left) {
            columns.push(format!("{}{}", c, right_suffix));
        } else {
            columns.push(c.clone());
        }
    }

    let left_groups = group_by_key(left, lk);
    let right_groups = group_by_key(right, rk);

    let mut keys: Vec<&Cell> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for row in left.rows().iter().map(|r| &r[lk]).chain(right.rows().iter().map(|r| &r[rk])) {
        if seen.insert(key_string(row)) {
            keys.push(row);
        }
    }
    keys.sort_by(|a, b| compare_keys(a, b));

    let mut out = Table::new(columns);
    let empty: Vec<usize> = Vec::new();
    for k in keys {
        let ks = key_string(k);
        let lrows = left_groups.get(&ks).unwrap_or(&empty);
        let rrows = right_groups.get(&ks).unwrap_or(&empty);

        let left_side: Vec<Vec<Cell>> = if lrows.is_empty() {
            let mut blank = vec![Value::Null; left.column_count()];
            blank[lk] = k.clone();
            vec![blank]
        } else {
            lrows.iter().map(|&i| left.rows()[i].clone()).collect()
        };
        let right_side: Vec<Vec<Cell>> = if rrows.is_empty() {
            vec![vec![Value::Null; right_cols.len()]]
        } else {
            rrows
                .iter()
                .map(|&i| right_cols.iter().map(|&c| right.rows()[i][c].clone()).collect())
                .collect()
        };

        for l in &left_side {
            for r in &right_side {
                let mut row = l.clone();
                row.extend(r.iter().cloned());
                out.push_row(row);
            }
        }
    }
    out
}

fn group_by_key(table: &Table, key_idx: usize) -> HashMap<String, Vec<usize>> {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows().iter().enumerate() {
        groups.entry(key_string(&row[key_idx])).or_default().push(i);
    }
    groups
}

fn key_string(cell: &Cell) -> String {
    serde_json::to_string(cell).unwrap_or_default()
}

/// Ascending key order with nulls last; mixed types order by kind.
fn compare_keys(a: &Cell, b: &Cell) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) | Value::Object(_) => 3,
            Value::Null => 4,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)).then_with(|| key_string(a).cmp(&key_string(b))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn tagged(tag: &str, t: Table) -> (String, Table) {
        (tag.to_string(), t)
    }

    #[test]
    fn test_three_way_outer_join_with_defaults() {
        let csv = table(
            &["date", "city", "temperature_c"],
            vec![vec![json!("2024-01-01"), json!("Oslo"), json!(-3.0)]],
        );
        let json_src = table(
            &["date", "humidity", "wind_speed_kmph"],
            vec![vec![json!("2024-01-02"), json!(70), json!(12)]],
        );
        let sheet = table(
            &["date", "rainfall_mm"],
            vec![vec![json!("2024-01-01"), json!(4.2)]],
        );

        let merged = merge_sources(
            vec![tagged("csv", csv), tagged("json", json_src), tagged("google", sheet)],
            "date",
        )
        .unwrap();
        let merged = fill_defaults(merged);

        assert_eq!(
            merged.columns(),
            &["date", "city", "temperature_c", "humidity", "wind_speed_kmph", "rainfall_mm"]
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get(0, "date"), Some(&json!("2024-01-01")));
        assert_eq!(merged.get(0, "rainfall_mm"), Some(&json!(4.2)));
        assert_eq!(merged.get(0, "humidity"), Some(&json!(0.0)));

        assert_eq!(merged.get(1, "date"), Some(&json!("2024-01-02")));
        assert_eq!(merged.get(1, "temperature_c"), Some(&json!(0.0)));
        assert_eq!(merged.get(1, "city"), Some(&Value::Null));
        assert_eq!(merged.get(1, "rainfall_mm"), Some(&Value::Null));
    }

    #[test]
    fn test_collision_suffixes() {
        let a = table(&["date", "humidity"], vec![vec![json!("d1"), json!(1)]]);
        let b = table(&["date", "humidity"], vec![vec![json!("d1"), json!(2)]]);
        let c = table(&["humidity", "date"], vec![vec![json!(3), json!("d1")]]);

        let merged = merge_sources(
            vec![tagged("csv", a), tagged("json", b), tagged("google", c)],
            "date",
        )
        .unwrap();
        assert_eq!(merged.columns(), &["date", "humidity_csv", "humidity_json", "humidity"]);
        assert_eq!(merged.rows()[0], vec![json!("d1"), json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_second_join_suffixes_only_incoming_collisions() {
        let a = table(&["date", "city"], vec![vec![json!("d1"), json!("x")]]);
        let b = table(&["date", "score"], vec![vec![json!("d1"), json!(1)]]);
        let c = table(&["date", "city"], vec![vec![json!("d1"), json!("y")]]);

        let merged = merge_sources(
            vec![tagged("csv", a), tagged("json", b), tagged("google", c)],
            "date",
        )
        .unwrap();
        assert_eq!(merged.columns(), &["date", "city", "score", "city_google"]);
    }

    #[test]
    fn test_duplicate_keys_produce_cross_product() {
        let a = table(
            &["date", "a"],
            vec![vec![json!("d1"), json!(1)], vec![json!("d1"), json!(2)]],
        );
        let b = table(
            &["date", "b"],
            vec![vec![json!("d1"), json!(10)], vec![json!("d1"), json!(20)]],
        );
        let merged = merge_sources(vec![tagged("csv", a), tagged("json", b)], "date").unwrap();
        assert_eq!(merged.len(), 4);
        assert_eq!(merged.rows()[1], vec![json!("d1"), json!(1), json!(20)]);
    }

    #[test]
    fn test_keys_sorted_with_nulls_last() {
        let a = table(
            &["date", "a"],
            vec![
                vec![Value::Null, json!(0)],
                vec![json!("2024-02-01"), json!(1)],
            ],
        );
        let b = table(&["date", "b"], vec![vec![json!("2024-01-01"), json!(2)]]);
        let merged = merge_sources(vec![tagged("csv", a), tagged("json", b)], "date").unwrap();
        let dates: Vec<&Value> = merged.column_values("date").unwrap().collect();
        assert_eq!(dates, vec![&json!("2024-01-01"), &json!("2024-02-01"), &Value::Null]);
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let a = table(&["date", "a"], vec![vec![json!("d1"), json!(1)]]);
        let b = Table::empty();
        let err = merge_sources(vec![tagged("csv", a), tagged("json", b)], "date").unwrap_err();
        match err {
            EtlError::MissingColumn { column, source_label } => {
                assert_eq!(column, "date");
                assert!(source_label.contains("json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fill_defaults_only_touches_fill_columns() {
        let t = table(
            &["date", "humidity", "city"],
            vec![vec![json!("d1"), Value::Null, Value::Null]],
        );
        let filled = fill_defaults(t);
        assert_eq!(filled.get(0, "humidity"), Some(&json!(0.0)));
        assert_eq!(filled.get(0, "city"), Some(&Value::Null));
    }
}
