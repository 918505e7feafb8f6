//! Text table files

use crate::error::Result;
use crate::table::Table;
use std::path::Path;

/// Read a whitespace-delimited table; see [`Table::parse`] for `columns`
pub fn read_table<P: AsRef<Path>>(path: P, columns: Option<&[String]>) -> Result<Table> {
    let text = std::fs::read_to_string(path)?;
    Table::parse(&text, columns)
}

/// Write a table with a header row
pub fn write_table<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    std::fs::write(path, table.to_text())?;
    Ok(())
}
