//! Upload readers: turn the bytes of a `.csv`, `.xlsx` or `.xls` file into
//! loosely-typed [`RawRow`]s keyed by the header row.

use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use dash_core::error::{DashError, Result};
use dash_core::models::RawRow;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Display pattern for date cells read from a spreadsheet.
pub const SPREADSHEET_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

static NUMERIC_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$").expect("regex is valid")
});

// ── FileFormat ────────────────────────────────────────────────────────────────

/// The two accepted upload families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Pick the reader for `path` from its extension, ignoring case.
///
/// Returns `None` for anything other than `.csv`, `.xlsx` or `.xls`.
pub fn detect_format(path: &Path) -> Option<FileFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some(FileFormat::Csv),
        "xlsx" | "xls" => Some(FileFormat::Spreadsheet),
        _ => None,
    }
}

/// Parse `bytes` with the reader for `format`.
pub fn read_rows(format: FileFormat, bytes: &[u8]) -> Result<Vec<RawRow>> {
    match format {
        FileFormat::Csv => read_csv_rows(bytes),
        FileFormat::Spreadsheet => read_spreadsheet_rows(bytes),
    }
}

// ── CSV ───────────────────────────────────────────────────────────────────────

/// Read a CSV document with a mandatory header row.
///
/// Cells are typed dynamically: numeric text becomes a number,
/// `true`/`false` a boolean and an empty cell `null`. Empty lines are
/// skipped. A record whose field count differs from the header is a
/// structural error and fails the whole file.
pub fn read_csv_rows(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DashError::Parse(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DashError::Parse(e.to_string()))?;
        let mut row = RawRow::new();
        for (name, cell) in headers.iter().zip(record.iter()) {
            row.insert(name.clone(), dynamic_cell(cell));
        }
        rows.push(row);
    }

    debug!(rows = rows.len(), columns = headers.len(), "Parsed CSV upload");
    Ok(rows)
}

fn dynamic_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match cell {
        "true" | "TRUE" => return Value::Bool(true),
        "false" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if NUMERIC_CELL.is_match(cell) {
        if let Some(n) = cell
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(n);
        }
    }
    Value::String(cell.to_string())
}

// ── Spreadsheet ───────────────────────────────────────────────────────────────

/// Read the first worksheet of an `.xlsx`/`.xls` workbook held in memory.
///
/// The first row of the used range is the header. Empty cells become `""`,
/// date cells are rendered with [`SPREADSHEET_DATE_FORMAT`] and rows with no
/// content are skipped.
pub fn read_spreadsheet_rows(bytes: &[u8]) -> Result<Vec<RawRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DashError::Parse(e.to_string()))?;

    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| DashError::Parse(e.to_string()))?;

    let mut lines = range.rows();
    let Some(header_cells) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers = header_names(header_cells);

    let mut rows = Vec::new();
    for cells in lines {
        if cells.iter().all(is_blank) {
            continue;
        }
        let mut row = RawRow::new();
        for (i, name) in headers.iter().enumerate() {
            let value = cells
                .get(i)
                .map(spreadsheet_cell)
                .unwrap_or_else(|| Value::String(String::new()));
            row.insert(name.clone(), value);
        }
        rows.push(row);
    }

    debug!(sheet = %sheet, rows = rows.len(), "Parsed spreadsheet upload");
    Ok(rows)
}

/// Header text for each column. Blank headers become `__EMPTY` and repeated
/// names get a `_1`, `_2`, ... suffix so no column is lost.
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    cells
        .iter()
        .map(|cell| {
            let base = match cell {
                Data::Empty => "__EMPTY".to_string(),
                other => other.to_string(),
            };
            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

fn spreadsheet_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => Value::String(dt.format(SPREADSHEET_DATE_FORMAT).to_string()),
            None => Value::String(cell.to_string()),
        },
        other => Value::String(other.to_string()),
    }
}
