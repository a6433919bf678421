// Page layout for the manager report.
//
// Geometry is in millimetres on an A4 portrait page with the origin at the
// top-left corner; the writer flips it into PDF user space.
use crate::highlight::{classify, is_long_duration};
use crate::pdf::font::{FontStyle, TextMetrics};
use crate::reports::{summarize, FilteredView};
use crate::types::{Field, HighlightClass, Row};
use crate::util::{format_number, truncate_chars};
use chrono::NaiveDateTime;

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
pub const MARGIN: f32 = 10.0;
pub const LINE_HEIGHT: f32 = 8.0;
/// Rows start on a new page once the cursor is below this distance from the bottom.
pub const BREAK_DISTANCE: f32 = 25.0;
pub const FOOTER_DISTANCE: f32 = 15.0;
pub const MAX_CELL_CHARS: usize = 25;
/// Points per millimetre.
pub const PT_PER_MM: f32 = 72.0 / 25.4;
/// Padding before left-aligned text.
const CELL_PADDING: f32 = 1.0;

pub const REPORT_TITLE: &str = "KSH Logistics OT Report";
pub const FOOTER_TEXT: &str = "Report generated automatically by KSH OT Dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const BLACK: Rgb = Rgb(0, 0, 0);
pub const DARK_RED: Rgb = Rgb(139, 0, 0);
pub const RED: Rgb = Rgb(255, 0, 0);
pub const BLUE: Rgb = Rgb(0, 0, 255);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub face: FontStyle,
    pub color: Rgb,
}

impl TextStyle {
    const fn new(size: f32, face: FontStyle) -> Self {
        TextStyle {
            size,
            face,
            color: BLACK,
        }
    }
}

const TITLE_STYLE: TextStyle = TextStyle::new(16.0, FontStyle::Bold);
const HEADER_STYLE: TextStyle = TextStyle::new(12.0, FontStyle::Regular);
const TABLE_HEADER_STYLE: TextStyle = TextStyle::new(12.0, FontStyle::Bold);
const CELL_SIZE: f32 = 11.0;
const FOOTER_STYLE: TextStyle = TextStyle::new(10.0, FontStyle::Italic);

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f32,
        baseline: f32,
        text: String,
        style: TextStyle,
    },
    Border {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub elements: Vec<Element>,
}

impl PageLayout {
    pub fn texts(&self) -> impl Iterator<Item = (&str, &TextStyle)> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text { text, style, .. } => Some((text.as_str(), style)),
            Element::Border { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    /// Bordered table cell, text centered.
    Boxed,
    Centered,
    /// Padded left-aligned text.
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutState {
    NewPage,
    HeaderEmitted,
    TableHeaderEmitted,
    RowEmitted,
    FooterEmitted,
}

impl LayoutState {
    /// Whether `next` may follow `prev`; `None` is the state before the first page.
    pub fn can_follow(prev: Option<LayoutState>, next: LayoutState) -> bool {
        use LayoutState::*;
        matches!(
            (prev, next),
            (None, NewPage)
                | (Some(FooterEmitted), NewPage)
                | (Some(NewPage), HeaderEmitted)
                | (Some(HeaderEmitted), TableHeaderEmitted)
                | (Some(TableHeaderEmitted), RowEmitted)
                | (Some(TableHeaderEmitted), FooterEmitted)
                | (Some(RowEmitted), RowEmitted)
                | (Some(RowEmitted), FooterEmitted)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub title: String,
    pub period: String,
    pub generated_at: NaiveDateTime,
    pub currency: String,
}

impl ReportMeta {
    pub fn new(period: &str, generated_at: NaiveDateTime) -> Self {
        ReportMeta {
            title: REPORT_TITLE.to_string(),
            period: period.to_string(),
            generated_at,
            currency: "₹".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportLayout {
    pub pages: Vec<PageLayout>,
    pub transitions: Vec<LayoutState>,
}

struct LayoutBuilder<'m> {
    metrics: &'m dyn TextMetrics,
    pages: Vec<PageLayout>,
    transitions: Vec<LayoutState>,
    state: Option<LayoutState>,
    y: f32,
}

impl<'m> LayoutBuilder<'m> {
    fn new(metrics: &'m dyn TextMetrics) -> Self {
        LayoutBuilder {
            metrics,
            pages: Vec::new(),
            transitions: Vec::new(),
            state: None,
            y: MARGIN,
        }
    }

    fn advance(&mut self, next: LayoutState) {
        debug_assert!(
            LayoutState::can_follow(self.state, next),
            "invalid layout transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = Some(next);
        self.transitions.push(next);
    }

    fn push(&mut self, element: Element) {
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn text_width_mm(&self, text: &str, size: f32) -> f32 {
        self.metrics.text_width(text, size) / PT_PER_MM
    }

    /// Place `text` in a `w` x `h` cell at (`x`, current y).
    fn cell(&mut self, x: f32, w: f32, h: f32, text: &str, style: TextStyle, kind: CellKind) {
        if kind == CellKind::Boxed {
            self.push(Element::Border { x, y: self.y, w, h });
        }
        if text.is_empty() {
            return;
        }
        let text_x = match kind {
            CellKind::Left => x + CELL_PADDING,
            CellKind::Centered | CellKind::Boxed => {
                x + (w - self.text_width_mm(text, style.size)) / 2.0
            }
        };
        let baseline = self.y + 0.5 * h + 0.3 * style.size / PT_PER_MM;
        self.push(Element::Text {
            x: text_x,
            baseline,
            text: text.to_string(),
            style,
        });
    }

    /// Full-width cell followed by a line break.
    fn line(&mut self, text: &str, h: f32, style: TextStyle, kind: CellKind) {
        self.cell(MARGIN, PAGE_WIDTH - 2.0 * MARGIN, h, text, style, kind);
        self.y += h;
    }

    fn new_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.y = MARGIN;
        self.advance(LayoutState::NewPage);
    }

    fn header(&mut self, meta: &ReportMeta, summary: Option<&[String; 3]>) {
        self.line(&meta.title, 10.0, TITLE_STYLE, CellKind::Centered);
        self.y += 2.0;
        self.line(&format!("Report Period: {}", meta.period), 8.0, HEADER_STYLE, CellKind::Centered);
        let generated = meta.generated_at.format("%d-%m-%Y %H:%M");
        self.line(&format!("Generated on: {}", generated), 8.0, HEADER_STYLE, CellKind::Centered);
        self.y += 6.0;
        if let Some(lines) = summary {
            for text in lines {
                self.line(text, LINE_HEIGHT, HEADER_STYLE, CellKind::Left);
            }
            self.y += 4.0;
        }
        self.advance(LayoutState::HeaderEmitted);
    }

    fn table_header(&mut self, columns: &[String], col_width: f32) {
        for (i, name) in columns.iter().enumerate() {
            let x = MARGIN + i as f32 * col_width;
            self.cell(x, col_width, LINE_HEIGHT, name, TABLE_HEADER_STYLE, CellKind::Boxed);
        }
        self.y += LINE_HEIGHT;
        self.advance(LayoutState::TableHeaderEmitted);
    }

    fn needs_break(&self) -> bool {
        self.y > PAGE_HEIGHT - BREAK_DISTANCE
    }

    fn row(&mut self, cells: Vec<(String, TextStyle)>, col_width: f32) {
        for (i, (text, style)) in cells.iter().enumerate() {
            let x = MARGIN + i as f32 * col_width;
            self.cell(x, col_width, LINE_HEIGHT, text, *style, CellKind::Boxed);
        }
        self.y += LINE_HEIGHT;
        self.advance(LayoutState::RowEmitted);
    }

    fn footer(&mut self) {
        self.y = PAGE_HEIGHT - FOOTER_DISTANCE;
        self.cell(MARGIN, PAGE_WIDTH - 2.0 * MARGIN, 10.0, FOOTER_TEXT, FOOTER_STYLE, CellKind::Centered);
        self.advance(LayoutState::FooterEmitted);
    }

    fn finish(self) -> ReportLayout {
        ReportLayout {
            pages: self.pages,
            transitions: self.transitions,
        }
    }
}

/// Style of one data cell given its column and the row's highlight class.
pub fn cell_style(field: Option<Field>, row: &Row<'_>, class: HighlightClass) -> TextStyle {
    match field {
        Some(Field::Amount) => TextStyle {
            size: CELL_SIZE,
            face: FontStyle::Bold,
            color: match class {
                HighlightClass::Top => DARK_RED,
                HighlightClass::High => RED,
                HighlightClass::Normal => BLACK,
            },
        },
        Some(Field::Hours) if is_long_duration(row.hours()) => TextStyle {
            size: CELL_SIZE,
            face: FontStyle::Bold,
            color: BLUE,
        },
        _ => TextStyle::new(CELL_SIZE, FontStyle::Regular),
    }
}

fn summary_lines(view: &FilteredView<'_>, currency: &str) -> [String; 3] {
    let total = summarize(view);
    [
        format!("Total Records: {}", total.records),
        format!("Total OT Hours: {:.1} hrs", total.hours),
        format!("Total OT Amount: {}{}", currency, format_number(total.amount, 2)),
    ]
}

/// Lay the view out page by page. The summary lines appear on the first
/// page only; every page repeats the title block and the table header.
pub fn layout_report(
    view: &FilteredView<'_>,
    meta: &ReportMeta,
    metrics: &dyn TextMetrics,
) -> ReportLayout {
    let columns = view.columns();
    let col_width = PAGE_WIDTH / (columns.len() + 1) as f32;
    let fields: Vec<Option<Field>> = columns.iter().map(|c| Field::from_header(c)).collect();
    let classes = classify(view);
    let summary = summary_lines(view, &meta.currency);

    let mut builder = LayoutBuilder::new(metrics);
    builder.new_page();
    builder.header(meta, Some(&summary));
    builder.table_header(columns, col_width);

    for (row, class) in view.rows().zip(classes) {
        if builder.needs_break() {
            builder.footer();
            builder.new_page();
            builder.header(meta, None);
            builder.table_header(columns, col_width);
        }
        let cells = row
            .cells()
            .iter()
            .zip(&fields)
            .map(|(cell, field)| {
                let label = cell.label();
                let text = truncate_chars(&label, MAX_CELL_CHARS).to_string();
                (text, cell_style(*field, &row, class))
            })
            .collect();
        builder.row(cells, col_width);
    }

    builder.footer();
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::font::ReportFont;
    use crate::reports::filter;
    use crate::types::{CellValue, Dataset, FilterSelection, Record};
    use chrono::NaiveDate;

    fn meta() -> ReportMeta {
        let at = NaiveDate::from_ymd_opt(2025, 10, 24)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        ReportMeta::new("01-10-2025 to 24-10-2025", at)
    }

    fn dataset(rows: usize) -> Dataset {
        let columns = ["Warehouse", "Name of the Employee", "Duration of work", "Total amt."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = (0..rows)
            .map(|i| Record {
                cells: vec![
                    CellValue::Text(format!("WH{}", i % 2)),
                    CellValue::Text(format!("Employee {}", i)),
                    CellValue::Number(4.0 + (i % 10) as f64),
                    CellValue::Number(100.0 * i as f64),
                ],
            })
            .collect();
        Dataset::new(columns, records)
    }

    fn render(ds: &Dataset) -> ReportLayout {
        let view = filter(ds, &FilterSelection::default());
        layout_report(&view, &meta(), &ReportFont::standard())
    }

    #[test]
    fn header_block_and_summary_on_first_page() {
        let ds = dataset(3);
        let layout = render(&ds);
        assert_eq!(layout.pages.len(), 1);
        let texts: Vec<&str> = layout.pages[0].texts().map(|(t, _)| t).collect();
        assert_eq!(texts[0], REPORT_TITLE);
        assert_eq!(texts[1], "Report Period: 01-10-2025 to 24-10-2025");
        assert_eq!(texts[2], "Generated on: 24-10-2025 09:30");
        assert_eq!(texts[3], "Total Records: 3");
        assert_eq!(texts[4], "Total OT Hours: 15.0 hrs");
        assert_eq!(texts[5], "Total OT Amount: ₹300.00");
        assert_eq!(*texts.last().unwrap(), FOOTER_TEXT);
    }

    #[test]
    fn first_page_holds_25_rows_then_28_per_page() {
        assert_eq!(render(&dataset(25)).pages.len(), 1);
        assert_eq!(render(&dataset(26)).pages.len(), 2);
        assert_eq!(render(&dataset(53)).pages.len(), 2);
        assert_eq!(render(&dataset(54)).pages.len(), 3);
    }

    #[test]
    fn page_break_repeats_header_and_closes_with_footer() {
        use LayoutState::*;
        let layout = render(&dataset(26));
        let t = &layout.transitions;
        assert_eq!(&t[..3], &[NewPage, HeaderEmitted, TableHeaderEmitted]);
        assert_eq!(
            &t[28..],
            &[FooterEmitted, NewPage, HeaderEmitted, TableHeaderEmitted, RowEmitted, FooterEmitted]
        );
        for pair in t.windows(2) {
            assert!(LayoutState::can_follow(Some(pair[0]), pair[1]));
        }
        let second: Vec<&str> = layout.pages[1].texts().map(|(t, _)| t).collect();
        assert_eq!(second[0], REPORT_TITLE);
        assert!(!second.iter().any(|t| t.starts_with("Total Records")));
        assert!(second.contains(&"Total amt."));
        assert!(second.contains(&"Employee 25"));
    }

    #[test]
    fn empty_view_still_lays_out_a_page() {
        use LayoutState::*;
        let ds = dataset(4);
        let mut sel = FilterSelection::default();
        sel.warehouses.insert("WH1-missing".into());
        let view = filter(&ds, &sel);
        let layout = layout_report(&view, &meta(), &ReportFont::standard());
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(
            layout.transitions,
            vec![NewPage, HeaderEmitted, TableHeaderEmitted, FooterEmitted]
        );
        assert!(layout.pages[0].texts().any(|(t, _)| t == "Total Records: 0"));
    }

    #[test]
    fn amount_and_duration_cells_are_styled() {
        let ds = Dataset::new(
            vec!["Duration of work".into(), "Total amt.".into(), "Customer".into()],
            vec![
                Record { cells: vec![CellValue::Number(12.0), CellValue::Number(10000.0), CellValue::Text("A".into())] },
                Record { cells: vec![CellValue::Number(3.0), CellValue::Number(9000.0), CellValue::Text("A".into())] },
                Record { cells: vec![CellValue::Number(3.0), CellValue::Number(8000.0), CellValue::Text("A".into())] },
                Record { cells: vec![CellValue::Number(3.0), CellValue::Number(7000.0), CellValue::Text("A".into())] },
                Record { cells: vec![CellValue::Number(3.0), CellValue::Number(100.0), CellValue::Text("A".into())] },
            ],
        );
        let layout = render(&ds);
        let styles: Vec<(&str, TextStyle)> = layout.pages[0]
            .texts()
            .map(|(t, s)| (t, *s))
            .collect();
        let find = |text: &str| styles.iter().find(|(t, _)| *t == text).map(|(_, s)| *s).unwrap();

        let long = find("12.0");
        assert_eq!((long.face, long.color), (FontStyle::Bold, BLUE));
        let short = find("3.0");
        assert_eq!((short.face, short.color), (FontStyle::Regular, BLACK));
        assert_eq!(find("10000.0").color, DARK_RED);
        assert_eq!(find("7000.0").color, RED);
        let normal = find("100.0");
        assert_eq!((normal.face, normal.color), (FontStyle::Bold, BLACK));
        assert_eq!(find("A").face, FontStyle::Regular);
    }

    #[test]
    fn long_cell_text_is_cut_to_25_characters() {
        let ds = Dataset::new(
            vec!["Name of the Employee".into(), "Total amt.".into()],
            vec![Record {
                cells: vec![
                    CellValue::Text("Venkataraghavan Subramaniam Iyer".into()),
                    CellValue::Number(10.0),
                ],
            }],
        );
        let layout = render(&ds);
        let texts: Vec<&str> = layout.pages[0].texts().map(|(t, _)| t).collect();
        assert!(texts.contains(&"Venkataraghavan Subramani"));
        assert!(!texts.iter().any(|t| t.contains("Iyer")));
    }
}
