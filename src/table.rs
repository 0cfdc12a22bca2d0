//! In-memory tabular representation shared by every pipeline stage.
//!
//! A [`Table`] is an ordered list of column names plus rows of [`Cell`]s.
//! Rows are always exactly as wide as the column list; short rows are padded
//! with nulls on the way in.

use serde::Serialize;
use serde_json::{Map, Number, Value};

/// A single scalar (or, for JSON sources, nested) value.
pub type Cell = Value;

/// One row keyed by column name, in column order.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// A table with no columns and no rows; what a failed stage degrades to.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Build a table from records, taking columns in first-seen order.
    /// Keys missing from a record become nulls.
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Names from `required` that this table does not have.
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.has_column(name))
            .collect()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Cell> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Replace the values of `name` in place, or append it as a new last column.
    pub fn set_column(&mut self, name: &str, mut values: Vec<Cell>) {
        values.resize(self.rows.len(), Value::Null);
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                self.columns.remove(idx);
                for row in &mut self.rows {
                    row.remove(idx);
                }
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every cell of `name`. Returns false if the column is absent.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(&Cell) -> Cell,
    {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }

    pub fn rename_columns<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        for column in &mut self.columns {
            *column = f(column);
        }
    }

    pub fn retain_rows<F>(&mut self, f: F)
    where
        F: FnMut(&Vec<Cell>) -> bool,
    {
        self.rows.retain(f);
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Record>()
            })
            .collect()
    }

    /// Header plus the first `n` rows as comma-joined lines, for log previews.
    pub fn preview(&self, n: usize) -> String {
        let mut out = self.columns.join(",");
        for row in self.rows.iter().take(n) {
            out.push('\n');
            let fields: Vec<String> = row.iter().map(cell_to_field).collect();
            out.push_str(&fields.join(","));
        }
        out
    }
}

/// Numeric view of a cell. Only JSON numbers count; strings are not coerced.
pub fn cell_to_f64(cell: &Cell) -> Option<f64> {
    cell.as_f64()
}

/// Wrap a float as a cell; non-finite values become null.
pub fn float_cell(x: f64) -> Cell {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

/// Round to `places` decimals, halves to even.
pub fn round_to(x: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (x * factor).round_ties_even() / factor
}

/// Text form of a cell as written to delimited output.
pub fn cell_to_field(cell: &Cell) -> String {
    match cell {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        nested => nested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(
            vec!["date".into(), "humidity".into()],
            vec![
                vec![json!("2024-01-01"), json!(40)],
                vec![json!("2024-01-02")],
            ],
        )
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "humidity"), Some(&Value::Null));
    }

    #[test]
    fn test_from_records_uses_first_seen_column_order() {
        let a = json!({"date": "2024-01-01", "humidity": 40});
        let b = json!({"wind_speed_kmph": 12, "date": "2024-01-02"});
        let records: Vec<Record> = vec![
            a.as_object().unwrap().clone(),
            b.as_object().unwrap().clone(),
        ];
        let table = Table::from_records(&records);
        assert_eq!(table.columns(), &["date", "humidity", "wind_speed_kmph"]);
        assert_eq!(table.get(1, "humidity"), Some(&Value::Null));
        assert_eq!(table.get(0, "wind_speed_kmph"), Some(&Value::Null));
    }

    #[test]
    fn test_set_column_replaces_in_place_or_appends() {
        let mut table = sample();
        table.set_column("humidity", vec![json!(1), json!(2)]);
        assert_eq!(table.columns(), &["date", "humidity"]);
        assert_eq!(table.get(1, "humidity"), Some(&json!(2)));

        table.set_column("score", vec![json!(0.5)]);
        assert_eq!(table.columns(), &["date", "humidity", "score"]);
        assert_eq!(table.get(1, "score"), Some(&Value::Null));
    }

    #[test]
    fn test_drop_column() {
        let mut table = sample();
        assert!(table.drop_column("date"));
        assert!(!table.drop_column("date"));
        assert_eq!(table.columns(), &["humidity"]);
        assert_eq!(table.rows()[0], vec![json!(40)]);
    }

    #[test]
    fn test_cell_to_field_formats() {
        assert_eq!(cell_to_field(&Value::Null), "");
        assert_eq!(cell_to_field(&json!(true)), "True");
        assert_eq!(cell_to_field(&float_cell(100.0)), "100.0");
        assert_eq!(cell_to_field(&json!(25)), "25");
        assert_eq!(cell_to_field(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn test_float_cell_rejects_nan() {
        assert_eq!(float_cell(f64::NAN), Value::Null);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(100.04999, 1), 100.0);
        assert_eq!(round_to(25.000000000000004, 2), 25.0);
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(-2.5, 0), -2.0);
    }
}
