//! Manager report rendering: layout of the filtered table onto pages and
//! serialization to PDF.

pub mod font;
pub mod layout;
pub mod writer;

use crate::error::Result;
use crate::reports::FilteredView;
use chrono::Local;
use tracing::info;

pub use font::{ensure_font, ReportFont, TextMetrics};
pub use layout::{layout_report, LayoutState, ReportLayout, ReportMeta};

pub const PDF_FILE_NAME: &str = "KSH_OT_Manager_Report.pdf";
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A rendered report, ready to be offered for download.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl ReportDocument {
    pub fn file_name(&self) -> &'static str {
        PDF_FILE_NAME
    }

    pub fn media_type(&self) -> &'static str {
        PDF_MEDIA_TYPE
    }
}

/// Render the view for `period`, stamped with the current local time.
pub fn render_pdf(view: &FilteredView<'_>, period: &str, font: &ReportFont) -> Result<ReportDocument> {
    let meta = ReportMeta::new(period, Local::now().naive_local());
    render_pdf_with(view, &meta, font)
}

pub fn render_pdf_with(
    view: &FilteredView<'_>,
    meta: &ReportMeta,
    font: &ReportFont,
) -> Result<ReportDocument> {
    let layout = layout_report(view, meta, font);
    let bytes = writer::write_pdf(&layout, font, &meta.title)?;
    info!(
        rows = view.len(),
        pages = layout.pages.len(),
        bytes = bytes.len(),
        "pdf report rendered"
    );
    Ok(ReportDocument {
        page_count: layout.pages.len(),
        bytes,
    })
}
