use crate::error::{ReportError, Result};
use crate::types::{CellValue, Dataset, Field, Record};
use crate::util::parse_f64_safe;
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Header row plus cells exactly as read from the upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Workbook,
    Csv,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(InputFormat::Workbook),
            "csv" => Ok(InputFormat::Csv),
            _ => Err(ReportError::UnsupportedFormat(ext)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    MissingColumn(String),
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::MissingColumn(name) => {
                write!(f, "Column `{}` not found in uploaded file.", name)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub source_rows: usize,
    pub retained_rows: usize,
    pub dropped_rows: usize,
    pub coerced_cells: usize,
    pub warnings: Vec<LoadWarning>,
}

/// Read the first worksheet of a workbook, or a CSV file, from disk.
pub fn read_table(path: &Path) -> Result<RawTable> {
    match InputFormat::from_path(path)? {
        InputFormat::Workbook => {
            let mut workbook = open_workbook_auto(path)
                .map_err(|e| ReportError::Workbook(format!("{}: {}", path.display(), e)))?;
            let sheet = first_sheet_name(&workbook.sheet_names())?;
            let range = workbook
                .worksheet_range(&sheet)
                .map_err(|e| ReportError::Workbook(e.to_string()))?;
            Ok(table_from_range(&range))
        }
        InputFormat::Csv => {
            let bytes = std::fs::read(path).map_err(|e| ReportError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            table_from_csv(&bytes)
        }
    }
}

/// Read an uploaded byte stream. Workbook kinds are detected from content.
pub fn read_table_bytes(bytes: &[u8], format: InputFormat) -> Result<RawTable> {
    match format {
        InputFormat::Workbook => {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
                .map_err(|e| ReportError::Workbook(e.to_string()))?;
            let sheet = first_sheet_name(&workbook.sheet_names())?;
            let range = workbook
                .worksheet_range(&sheet)
                .map_err(|e| ReportError::Workbook(e.to_string()))?;
            Ok(table_from_range(&range))
        }
        InputFormat::Csv => table_from_csv(bytes),
    }
}

fn first_sheet_name(names: &[String]) -> Result<String> {
    names
        .first()
        .cloned()
        .ok_or_else(|| ReportError::Workbook("workbook has no worksheets".to_string()))
}

fn table_from_range(range: &Range<Data>) -> RawTable {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return RawTable::default();
    };
    let headers = name_headers(header_row.iter().map(|c| cell_from_data(c).label().into_owned()));
    let rows = rows
        .map(|r| r.iter().map(cell_from_data).collect::<Vec<_>>())
        .filter(|r| !r.iter().all(CellValue::is_empty))
        .collect();
    RawTable { headers, rows }
}

fn table_from_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = name_headers(rdr.headers()?.iter().map(str::to_string));
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: Vec<CellValue> = record.iter().map(cell_from_text).collect();
        if row.iter().all(CellValue::is_empty) {
            continue;
        }
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

/// Blank headers become `Unnamed: <i>` so every column stays addressable.
fn name_headers<I: Iterator<Item = String>>(labels: I) -> Vec<String> {
    labels
        .enumerate()
        .map(|(i, label)| {
            if label.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                label
            }
        })
        .collect()
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(v) => CellValue::Number(*v),
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Bool(v) => CellValue::Bool(*v),
        Data::DateTime(v) => match v.as_datetime() {
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Number(v.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn cell_from_text(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Empty;
    }
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => CellValue::Number(v),
        _ => CellValue::Text(s.to_string()),
    }
}

/// Trim, then disambiguate repeated names with `.1`, `.2`, ... suffixes.
fn normalize_columns(headers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(headers.len());
    for h in headers {
        let base = h.trim().to_string();
        let mut name = base.clone();
        let mut n = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, n);
            n += 1;
        }
        seen.insert(name.clone());
        out.push(name);
    }
    out
}

/// Coerce a cell of a numeric column. Returns the cleaned cell and whether
/// a non-empty value had to be discarded.
fn coerce_numeric(cell: CellValue) -> (CellValue, bool) {
    match cell {
        CellValue::Empty => (CellValue::Empty, false),
        CellValue::Number(v) if v.is_finite() => (CellValue::Number(v), false),
        CellValue::Text(s) => match parse_f64_safe(Some(&s)) {
            Some(v) => (CellValue::Number(v), false),
            None => (CellValue::Empty, !s.trim().is_empty()),
        },
        _ => (CellValue::Empty, true),
    }
}

/// Normalize a raw table into a `Dataset`. Never fails: missing expected
/// columns are synthesized empty and reported as warnings.
pub fn ingest(raw: RawTable) -> (Dataset, LoadReport) {
    let mut columns = normalize_columns(&raw.headers);
    let source_width = columns.len();
    let mut warnings = Vec::new();

    for field in Field::EXPECTED {
        if !columns.iter().any(|c| c == field.header()) {
            warn!(column = field.header(), "expected column missing, synthesizing empty column");
            warnings.push(LoadWarning::MissingColumn(field.header().to_string()));
            columns.push(field.header().to_string());
        }
    }

    let numeric_positions: Vec<usize> = [Field::Hours, Field::Amount]
        .into_iter()
        .filter_map(|f| columns.iter().position(|c| c == f.header()))
        .collect();

    let source_rows = raw.rows.len();
    let mut coerced_cells = 0usize;
    let mut dropped_rows = 0usize;
    let mut records = Vec::with_capacity(source_rows);

    for mut cells in raw.rows {
        cells.truncate(source_width);
        cells.resize(columns.len(), CellValue::Empty);
        for &pos in &numeric_positions {
            let (cell, discarded) = coerce_numeric(std::mem::take(&mut cells[pos]));
            if discarded {
                coerced_cells += 1;
            }
            cells[pos] = cell;
        }
        if numeric_positions.iter().all(|&pos| cells[pos].is_empty()) {
            dropped_rows += 1;
            continue;
        }
        records.push(Record { cells });
    }

    if coerced_cells > 0 {
        debug!(coerced_cells, "non-numeric values coerced to empty");
    }
    let dataset = Dataset::new(columns, records);
    info!(
        source_rows,
        retained = dataset.len(),
        dropped = dropped_rows,
        "dataset ingested"
    );
    let report = LoadReport {
        source_rows,
        retained_rows: dataset.len(),
        dropped_rows,
        coerced_cells,
        warnings,
    };
    (dataset, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn table(headers: &[&str], rows: Vec<Vec<CellValue>>) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn trims_headers_and_synthesizes_missing_columns() {
        crate::logging::init_test();
        let raw = table(
            &[" Warehouse ", "Duration of work", "Total amt. "],
            vec![vec![text("WH1"), CellValue::Number(4.0), CellValue::Number(900.0)]],
        );
        let (ds, report) = ingest(raw);
        assert_eq!(
            ds.columns(),
            &[
                "Warehouse",
                "Duration of work",
                "Total amt.",
                "Customer",
                "Contractor Name"
            ]
        );
        assert_eq!(
            report.warnings,
            vec![
                LoadWarning::MissingColumn("Customer".into()),
                LoadWarning::MissingColumn("Contractor Name".into())
            ]
        );
        let row = ds.row(0).unwrap();
        assert_eq!(row.get(Field::Customer), Some(&CellValue::Empty));
        assert_eq!(row.amount(), Some(900.0));
    }

    #[test]
    fn coerces_numbers_and_drops_rows_empty_in_both() {
        let raw = table(
            &["Warehouse", "Customer", "Contractor Name", "Duration of work", "Total amt."],
            vec![
                vec![text("A"), text("C"), text("K"), text("8"), text("1,200")],
                vec![text("A"), text("C"), text("K"), text("n/a"), CellValue::Empty],
                vec![text("B"), text("C"), text("K"), CellValue::Empty, CellValue::Number(3000.0)],
                vec![text("B"), text("C"), text("K"), CellValue::Bool(true), text("abc")],
            ],
        );
        let (ds, report) = ingest(raw);
        assert_eq!(ds.len(), 2);
        assert_eq!(report.source_rows, 4);
        assert_eq!(report.dropped_rows, 2);
        assert_eq!(report.coerced_cells, 3);
        let first = ds.row(0).unwrap();
        assert_eq!(first.hours(), Some(8.0));
        assert_eq!(first.amount(), Some(1200.0));
        let second = ds.row(1).unwrap();
        assert_eq!(second.hours(), None);
        assert_eq!(second.amount(), Some(3000.0));
    }

    #[test]
    fn ingest_of_headerless_table_yields_empty_dataset() {
        let (ds, report) = ingest(RawTable::default());
        assert!(ds.is_empty());
        assert_eq!(report.warnings.len(), 5);
        assert_eq!(ds.columns().len(), 5);
    }

    #[test]
    fn duplicate_and_blank_headers_are_named() {
        let raw = table(&["Warehouse", "Warehouse ", ""], vec![]);
        let headers = name_headers(raw.headers.iter().cloned());
        assert_eq!(normalize_columns(&headers), vec!["Warehouse", "Warehouse.1", "Unnamed: 2"]);
    }

    #[test]
    fn csv_cells_are_typed() {
        let csv = "Warehouse,Duration of work,Total amt.\nWH1,8,2500\n,,\nWH2,abc,100.5\n";
        let raw = read_table_bytes(csv.as_bytes(), InputFormat::Csv).unwrap();
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[0][1], CellValue::Number(8.0));
        assert_eq!(raw.rows[1][1], text("abc"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = InputFormat::from_path(Path::new("data.txt")).unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedFormat(ext) if ext == "txt"));
    }
}
