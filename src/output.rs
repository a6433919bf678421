use crate::error::{ReportError, Result};
use crate::reports::FilteredView;
use crate::types::CellValue;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

pub const SPREADSHEET_FILE_NAME: &str = "Filtered_OT_Data.xlsx";
pub const SPREADSHEET_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Serialize the view to XLSX bytes: one sheet, the dataset's header row,
/// then the view's rows as they are.
pub fn export_spreadsheet(view: &FilteredView<'_>) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1")?;
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col, name) in view.columns().iter().enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }
    for (idx, row) in view.rows().enumerate() {
        let r = (idx + 1) as u32;
        for (col, cell) in row.cells().iter().enumerate() {
            let c = col as u16;
            match cell {
                CellValue::Empty => {}
                CellValue::Text(s) => {
                    sheet.write_string(r, c, s)?;
                }
                CellValue::Number(v) => {
                    sheet.write_number(r, c, *v)?;
                }
                CellValue::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                CellValue::DateTime(dt) => {
                    sheet.write_datetime_with_format(r, c, dt, &datetime_format)?;
                }
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    info!(rows = view.len(), bytes = bytes.len(), "spreadsheet exported");
    Ok(bytes)
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(ReportError::from)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table<T>(title: &str, rows: &[T])
where
    T: Tabled + Clone,
{
    println!("{}\n", title);
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(rows.to_vec()).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Print the first `max_rows` rows of the view with its own columns.
pub fn preview_view(view: &FilteredView<'_>, max_rows: usize) {
    if view.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(view.columns().iter().cloned());
    for row in view.rows().take(max_rows) {
        builder.push_record(row.cells().iter().map(|c| c.label().into_owned()));
    }
    let table_str = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
