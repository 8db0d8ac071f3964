//! Spreadsheet rows as text.
//!
//! Row and column indices match the sheet: a used range that starts below
//! or right of A1 is padded back out. Trailing empty cells are dropped from
//! every row, so a row's length is the position of its last filled cell.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use crate::error::ExtractError;

pub trait SheetSource {
    fn read_sheet(&self, path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, ExtractError>;
}

/// Reads xlsx, xls, xlsb and ods through calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkbookReader;

impl SheetSource for WorkbookReader {
    fn read_sheet(&self, path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, ExtractError> {
        let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| ExtractError::SourceRead {
            path: path.to_path_buf(),
            message: format!("failed to open workbook: {e}"),
        })?;

        let range = workbook.worksheet_range(sheet).map_err(|e| ExtractError::SourceRead {
            path: path.to_path_buf(),
            message: format!("failed to read sheet '{sheet}': {e}"),
        })?;

        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row as usize];

        for cells in range.rows() {
            let mut row = vec![String::new(); start_col as usize];
            row.extend(cells.iter().map(cell_text));
            while row.last().is_some_and(|c| c.is_empty()) {
                row.pop();
            }
            rows.push(row);
        }

        log::debug!("{}: read {} rows from '{sheet}'", path.display(), rows.len());
        Ok(rows)
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
