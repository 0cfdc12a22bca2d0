use crate::constants::{DATE_COLUMN, TEMPERATURE_C_COLUMN, TEMPERATURE_F_COLUMN};
use crate::table::{cell_to_f64, float_cell, round_to, Cell, Table};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%Y.%m.%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Normalize one source's table.
///
/// Steps run in a fixed order: drop duplicate rows, drop all-null rows,
/// normalize the date column to `YYYY-MM-DD`, convert `temperature_f` to
/// `temperature_c`, then canonicalize column names. The date and temperature
/// steps find their columns by canonical name, so `Date` or `Temperature F`
/// headers are normalized too.
pub fn clean(mut table: Table, source_label: &str) -> Table {
    info!("Cleaning data from {}...", source_label);

    drop_duplicate_rows(&mut table);
    drop_empty_rows(&mut table);

    if let Some(date_column) = find_canonical_column(&table, DATE_COLUMN) {
        let mut unparsed = 0usize;
        table.map_column(&date_column, |cell| {
            let out = normalize_date_cell(cell);
            if out.is_null() && !cell.is_null() {
                unparsed += 1;
            }
            out
        });
        if unparsed > 0 {
            warn!(
                source = source_label,
                "{} unparseable date value(s) set to null", unparsed
            );
        }
    }

    if let Some(fahrenheit_column) = find_canonical_column(&table, TEMPERATURE_F_COLUMN) {
        convert_fahrenheit(&mut table, &fahrenheit_column, source_label);
    }

    // Normalization can make rows equal or all-null
    drop_duplicate_rows(&mut table);
    drop_empty_rows(&mut table);

    table.rename_columns(canonical_column_name);
    warn_duplicate_columns(&table, source_label);

    info!(outcome = "success", rows = table.len(), "Cleaned {}", source_label);
    table
}

/// First column whose canonical form is `canonical`, as currently named.
fn find_canonical_column(table: &Table, canonical: &str) -> Option<String> {
    table
        .columns()
        .iter()
        .find(|c| canonical_column_name(c) == canonical)
        .cloned()
}

fn warn_duplicate_columns(table: &Table, source_label: &str) {
    let mut seen: HashSet<&str> = HashSet::new();
    for column in table.columns() {
        if !seen.insert(column.as_str()) {
            warn!(
                source = source_label,
                "Duplicate column '{}' after renaming; lookups use the first one", column
            );
        }
    }
}

/// Keep the first occurrence of each distinct row.
pub fn drop_duplicate_rows(table: &mut Table) {
    let mut seen: HashSet<String> = HashSet::new();
    table.retain_rows(|row| seen.insert(row_key(row)));
}

pub fn drop_empty_rows(table: &mut Table) {
    table.retain_rows(|row| !row.iter().all(Value::is_null));
}

fn row_key(row: &[Cell]) -> String {
    // Value serialization is total; an error here is impossible for plain JSON values
    serde_json::to_string(row).unwrap_or_default()
}

/// `Date Recorded ` -> `date_recorded`
pub fn canonical_column_name(name: &str) -> String {
    name.to_lowercase().trim().replace(' ', "_")
}

/// Best-effort date inference. Returns `None` when nothing matches.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        // Compact YYYYMMDD
        let year = s[0..4].parse().ok()?;
        let month = s[4..6].parse().ok()?;
        let day = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn normalize_date_cell(cell: &Cell) -> Cell {
    let parsed = match cell {
        Value::String(s) => parse_date(s),
        Value::Number(n) => parse_date(&n.to_string()),
        _ => None,
    };
    parsed
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    round_to((f - 32.0) * 5.0 / 9.0, 1)
}

fn convert_fahrenheit(table: &mut Table, column: &str, source_label: &str) {
    let mut non_numeric = 0usize;
    let celsius: Vec<Cell> = table
        .column_values(column)
        .map(|values| {
            values
                .map(|cell| match cell_to_f64(cell) {
                    Some(f) => float_cell(fahrenheit_to_celsius(f)),
                    None => {
                        if !cell.is_null() {
                            non_numeric += 1;
                        }
                        Value::Null
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    if non_numeric > 0 {
        warn!(
            source = source_label,
            "{} non-numeric temperature_f value(s) converted to null", non_numeric
        );
    }

    table.set_column(TEMPERATURE_C_COLUMN, celsius);
    table.drop_column(column);
}
