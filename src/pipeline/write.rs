use crate::error::Result;
use crate::table::{cell_to_field, Table};
use std::fs;
use std::path::{Path, PathBuf};

/// Write `table` as CSV at `path`: header row in column order, no index
/// column. Parent directories are created. A table without columns yields an
/// empty file. Returns the resolved path.
pub fn write_table(table: &Table, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    if table.column_count() > 0 {
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row.iter().map(cell_to_field))?;
        }
    }
    writer.flush()?;

    Ok(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
}
