//! Spreadsheet reading.
//!
//! Uploads are either CSV files or workbooks (`.xlsx`, `.xls`, `.ods`).
//! Both are reduced to a [`Sheet`]: a header row and data rows of trimmed
//! string cells. Blank cells are treated as missing.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Reader};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// A parsed spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    file_name: String,
    headers: Vec<String>,
    rows: Vec<SheetRow>,
}

/// One data row of a [`Sheet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    line: usize,
    cells: HashMap<String, String>,
}

impl SheetRow {
    /// The 1-based line of this row in the source file.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The trimmed cell under `column`, or `None` if the column is absent or
    /// the cell is blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }
}

impl Sheet {
    /// Builds a sheet from a header row and raw records.
    ///
    /// Rows whose cells are all blank are dropped.
    pub fn from_records<I, R, S>(file_name: impl Into<String>, headers: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = (usize, R)>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let rows = records
            .into_iter()
            .filter_map(|(line, record)| {
                let cells: HashMap<String, String> = headers
                    .iter()
                    .zip(record)
                    .filter_map(|(header, cell)| {
                        let value = cell.as_ref().trim();
                        (!header.is_empty() && !value.is_empty())
                            .then(|| (header.clone(), value.to_string()))
                    })
                    .collect();
                (!cells.is_empty()).then_some(SheetRow { line, cells })
            })
            .collect();

        Self {
            file_name: file_name.into(),
            headers,
            rows,
        }
    }

    /// The name the sheet was read under.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The trimmed header row.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns true if the header row contains `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// The non-blank data rows.
    pub fn rows(&self) -> &[SheetRow] {
        &self.rows
    }
}

/// Reads a spreadsheet from memory, choosing the format by file extension.
///
/// # Example
///
/// ```
/// use payroll_engine::ingest::read_sheet;
///
/// let csv = b"employee_id,amount\nE001,$300.50\n";
/// let sheet = read_sheet("bonus.csv", csv).unwrap();
/// assert!(sheet.has_column("amount"));
/// assert_eq!(sheet.rows()[0].get("amount"), Some("$300.50"));
/// ```
pub fn read_sheet(file_name: &str, bytes: &[u8]) -> EngineResult<Sheet> {
    if file_name.to_ascii_lowercase().ends_with(".csv") {
        read_csv(file_name, bytes)
    } else {
        read_workbook(file_name, bytes)
    }
}

/// Reads a stored upload from disk.
pub fn read_path(path: &Path) -> EngineResult<Sheet> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = fs::read(path).map_err(|e| EngineError::SpreadsheetRead {
        file: file_name.clone(),
        message: e.to_string(),
    })?;
    read_sheet(&file_name, &bytes)
}

fn read_error(file_name: &str, message: impl ToString) -> EngineError {
    EngineError::SpreadsheetRead {
        file: file_name.to_string(),
        message: message.to_string(),
    }
}

fn read_csv(file_name: &str, bytes: &[u8]) -> EngineResult<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| read_error(file_name, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| read_error(file_name, e))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);
        records.push((line, record.iter().map(str::to_string).collect::<Vec<_>>()));
    }

    debug!(file = file_name, rows = records.len(), "Read CSV sheet");
    Ok(Sheet::from_records(file_name, headers, records))
}

fn read_workbook(file_name: &str, bytes: &[u8]) -> EngineResult<Sheet> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| read_error(file_name, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| read_error(file_name, "workbook has no worksheets"))?
        .map_err(|e| read_error(file_name, e))?;

    let first_line = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .unwrap_or_default();

    let records: Vec<(usize, Vec<String>)> = rows
        .enumerate()
        .map(|(index, row)| {
            (
                first_line + index + 1,
                row.iter().map(|cell| cell.to_string()).collect(),
            )
        })
        .collect();

    debug!(file = file_name, rows = records.len(), "Read workbook sheet");
    Ok(Sheet::from_records(file_name, headers, records))
}
