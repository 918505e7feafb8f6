//! Whitespace-delimited text tables

use crate::error::{Error, Result};

/// A table of string cells with named columns.
///
/// Cells are kept as text; [`Table::column_f64`] parses a column on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse whitespace-delimited text.
    ///
    /// With `columns` the text has no header row and every line is data;
    /// without it the first non-blank line is the header. Blank lines are
    /// skipped and every data row must have one cell per column.
    pub fn parse(text: &str, columns: Option<&[String]>) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.split_whitespace().collect::<Vec<_>>()))
            .filter(|(_, cells)| !cells.is_empty());

        let columns: Vec<String> = match columns {
            Some(names) => names.to_vec(),
            None => match lines.next() {
                Some((_, header)) => header.into_iter().map(str::to_string).collect(),
                None => Vec::new(),
            },
        };

        let mut rows = Vec::new();
        for (line, cells) in lines {
            if cells.len() != columns.len() {
                return Err(Error::Table {
                    line,
                    reason: format!("expected {} fields, found {}", columns.len(), cells.len()),
                });
            }
            rows.push(cells.into_iter().map(str::to_string).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                cell.parse::<f64>().map_err(|e| Error::Table {
                    line: i + 1,
                    reason: format!("column {name}: {cell:?} is not a number ({e})"),
                })
            })
            .collect()
    }

    /// Render with a header row, cells separated by a single space
    pub fn to_text(&self) -> String {
        let mut out = self.columns.join(" ");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join(" "));
            out.push('\n');
        }
        out
    }
}
