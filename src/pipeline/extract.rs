use crate::config::SourceSpec;
use crate::constants::NA_TOKENS;
use crate::error::{EtlError, Result};
use crate::metrics;
use crate::table::{Cell, Record, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, error, info};

/// How a source file is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Comma-separated text with a header row
    Delimited,
    /// A JSON document holding an array of flat records
    Records,
}

/// Read `path` into a table.
pub fn extract(path: &Path, format: SourceFormat) -> Result<Table> {
    match format {
        SourceFormat::Delimited => read_delimited(path),
        SourceFormat::Records => read_records(path),
    }
}

/// Extract a configured source, logging the outcome and degrading to an
/// empty table on any failure.
pub fn extract_or_empty(source: &SourceSpec, path: &Path) -> (Table, Option<EtlError>) {
    match extract(path, source.format) {
        Ok(table) => {
            info!(
                source = %source.label,
                rows = table.len(),
                "Loaded {:?} data from {}",
                source.format,
                path.display()
            );
            debug!("Preview of {}:\n{}", source.label, table.preview(5));
            metrics::extract::rows_extracted(&source.tag, table.len());
            (table, None)
        }
        Err(e) => {
            error!(source = %source.label, "Failed to load data from {}: {}", path.display(), e);
            metrics::extract::source_failure(&source.tag);
            (Table::empty(), Some(e))
        }
    }
}

/// Parse a delimited-text file whose first record is the header.
pub fn read_delimited(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() > columns.len() {
            return Err(EtlError::Source {
                path: path.display().to_string(),
                message: format!(
                    "row {} has {} fields, header has {}",
                    i + 2,
                    record.len(),
                    columns.len()
                ),
            });
        }
        raw_rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    let kinds: Vec<ColumnKind> = (0..columns.len())
        .map(|c| infer_column_kind(raw_rows.iter().map(|r| r.get(c).map(String::as_str))))
        .collect();

    let rows = raw_rows
        .into_iter()
        .map(|raw| {
            kinds
                .iter()
                .enumerate()
                .map(|(c, kind)| match raw.get(c) {
                    Some(field) => kind.convert(field),
                    None => Value::Null,
                })
                .collect::<Vec<Cell>>()
        })
        .collect();

    Ok(Table::from_rows(columns, rows))
}

/// Parse a JSON document into a table. Accepts an array of objects, or an
/// object mapping column names to equally-indexed arrays.
pub fn read_records(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let document: Value = serde_json::from_reader(BufReader::new(file))?;
    records_from_value(document).map_err(|message| EtlError::Source {
        path: path.display().to_string(),
        message,
    })
}

fn records_from_value(document: Value) -> std::result::Result<Table, String> {
    match document {
        Value::Array(items) => {
            let mut records: Vec<Record> = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(map) => records.push(map),
                    other => {
                        return Err(format!(
                            "element {} is {}, expected an object",
                            i,
                            json_kind(&other)
                        ))
                    }
                }
            }
            Ok(Table::from_records(&records))
        }
        Value::Object(map) if map.values().all(Value::is_array) => {
            let height = map
                .values()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .max()
                .unwrap_or(0);
            let columns: Vec<String> = map.keys().cloned().collect();
            let arrays: Vec<Vec<Value>> = map
                .into_iter()
                .map(|(_, v)| match v {
                    Value::Array(a) => a,
                    _ => Vec::new(),
                })
                .collect();
            let rows = (0..height)
                .map(|r| {
                    arrays
                        .iter()
                        .map(|col| col.get(r).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            Ok(Table::from_rows(columns, rows))
        }
        other => Err(format!(
            "top-level {} is not an array of records",
            json_kind(&other)
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

fn is_na(field: &str) -> bool {
    NA_TOKENS.contains(&field.trim())
}

fn parse_bool(field: &str) -> Option<bool> {
    match field.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Pick the narrowest type every non-null field of a column fits.
/// A column with no non-null fields converts to all nulls whatever the kind.
fn infer_column_kind<'a, I>(fields: I) -> ColumnKind
where
    I: Iterator<Item = Option<&'a str>>,
{
    let mut integer = true;
    let mut float = true;
    let mut boolean = true;

    for field in fields.flatten() {
        if is_na(field) {
            continue;
        }
        let f = field.trim();
        integer = integer && f.parse::<i64>().is_ok();
        float = float && f.parse::<f64>().is_ok();
        boolean = boolean && parse_bool(f).is_some();
        if !integer && !float && !boolean {
            return ColumnKind::Text;
        }
    }

    if integer {
        ColumnKind::Integer
    } else if float {
        ColumnKind::Float
    } else if boolean {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    }
}

impl ColumnKind {
    fn convert(self, field: &str) -> Cell {
        if is_na(field) {
            return Value::Null;
        }
        let f = field.trim();
        match self {
            ColumnKind::Integer => f.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            ColumnKind::Float => f
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnKind::Boolean => parse_bool(f).map(Value::Bool).unwrap_or(Value::Null),
            ColumnKind::Text => Value::String(field.to_string()),
        }
    }
}
