//! Overtime labor reporting: a pure pipeline from an uploaded spreadsheet
//! to filtered views, chart aggregates, and XLSX/PDF exports.
//!
//! ```text
//! read_table -> ingest -> filter -> aggregate / classify -> export_spreadsheet / render_pdf
//! ```

pub mod config;
pub mod error;
pub mod highlight;
pub mod loader;
pub mod logging;
pub mod output;
pub mod pdf;
pub mod reports;
pub mod types;
pub mod util;

pub use error::{ReportError, Result};
pub use highlight::classify;
pub use loader::{ingest, read_table, read_table_bytes, InputFormat, LoadReport, RawTable};
pub use output::export_spreadsheet;
pub use pdf::{render_pdf, ReportDocument, ReportFont};
pub use reports::{aggregate, filter, summarize, FilteredView};
pub use types::{Dataset, Field, FilterSelection, HighlightClass};
