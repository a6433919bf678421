use chrono::NaiveDateTime;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use tabled::Tabled;

use crate::util::display_number;

/// Number of largest amounts that make a row `Top`.
pub const TOP_N: usize = 3;
/// Amounts at or above this (currency units) are `High` when not `Top`.
pub const HIGH_AMOUNT_THRESHOLD: f64 = 5000.0;
/// Durations at or above this many hours are emphasised in the PDF.
pub const LONG_DURATION_HOURS: f64 = 12.0;

/// The source columns the pipeline knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Warehouse,
    Customer,
    Contractor,
    Employee,
    Hours,
    Amount,
    Reason,
}

impl Field {
    /// Columns synthesized as empty when the upload lacks them.
    pub const EXPECTED: [Field; 5] = [
        Field::Warehouse,
        Field::Customer,
        Field::Contractor,
        Field::Hours,
        Field::Amount,
    ];

    pub const ALL: [Field; 7] = [
        Field::Warehouse,
        Field::Customer,
        Field::Contractor,
        Field::Employee,
        Field::Hours,
        Field::Amount,
        Field::Reason,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Field::Warehouse => "Warehouse",
            Field::Customer => "Customer",
            Field::Contractor => "Contractor Name",
            Field::Employee => "Name of the Employee",
            Field::Hours => "Duration of work",
            Field::Amount => "Total amt.",
            Field::Reason => "Remarks/Reasons",
        }
    }

    pub fn from_header(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.header() == name)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Hours | Field::Amount)
    }
}

/// One spreadsheet cell after reading.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text shown for the cell in tables, filters and the PDF. Empty cells
    /// render as an empty string.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            CellValue::Empty => Cow::Borrowed(""),
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
            CellValue::Number(n) => Cow::Owned(display_number(*n)),
            CellValue::Bool(b) => Cow::Owned(if *b { "True" } else { "False" }.to_string()),
            CellValue::DateTime(dt) => Cow::Owned(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub cells: Vec<CellValue>,
}

/// Column positions of the known fields inside a dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    positions: [Option<usize>; 7],
}

impl Schema {
    pub fn from_columns(columns: &[String]) -> Self {
        let mut positions = [None; 7];
        for (idx, field) in Field::ALL.into_iter().enumerate() {
            positions[idx] = columns.iter().position(|c| c == field.header());
        }
        Schema { positions }
    }

    pub fn position(&self, field: Field) -> Option<usize> {
        let idx = Field::ALL.iter().position(|f| *f == field)?;
        self.positions[idx]
    }
}

/// Cleaned table in source row order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        let schema = Schema::from_columns(&columns);
        Dataset {
            columns,
            schema,
            records,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, field: Field) -> bool {
        self.schema.position(field).is_some()
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.records.get(idx).map(|record| Row {
            schema: &self.schema,
            record,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.records.iter().map(move |record| Row {
            schema: &self.schema,
            record,
        })
    }
}

/// Borrowed record with field accessors.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    schema: &'a Schema,
    record: &'a Record,
}

impl<'a> Row<'a> {
    pub fn cells(&self) -> &'a [CellValue] {
        &self.record.cells
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    pub fn get(&self, field: Field) -> Option<&'a CellValue> {
        self.schema
            .position(field)
            .and_then(|idx| self.record.cells.get(idx))
    }

    /// Non-empty display label of a categorical field.
    pub fn category(&self, field: Field) -> Option<Cow<'a, str>> {
        match self.get(field)? {
            CellValue::Empty => None,
            cell => Some(cell.label()),
        }
    }

    pub fn hours(&self) -> Option<f64> {
        self.get(Field::Hours).and_then(CellValue::as_number)
    }

    pub fn amount(&self) -> Option<f64> {
        self.get(Field::Amount).and_then(CellValue::as_number)
    }
}

/// Allowed values per filterable field. An empty set does not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub warehouses: BTreeSet<String>,
    pub customers: BTreeSet<String>,
    pub contractors: BTreeSet<String>,
}

impl FilterSelection {
    pub fn is_unrestricted(&self) -> bool {
        self.warehouses.is_empty() && self.customers.is_empty() && self.contractors.is_empty()
    }

    pub fn restrictions(&self) -> [(Field, &BTreeSet<String>); 3] {
        [
            (Field::Warehouse, &self.warehouses),
            (Field::Customer, &self.customers),
            (Field::Contractor, &self.contractors),
        ]
    }

    pub fn set_mut(&mut self, field: Field) -> Option<&mut BTreeSet<String>> {
        match field {
            Field::Warehouse => Some(&mut self.warehouses),
            Field::Customer => Some(&mut self.customers),
            Field::Contractor => Some(&mut self.contractors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HighlightClass {
    Top,
    High,
    Normal,
}

impl HighlightClass {
    pub fn label(self) -> &'static str {
        match self {
            HighlightClass::Top => "Top",
            HighlightClass::High => "High",
            HighlightClass::Normal => "Normal",
        }
    }
}

/// Grouped sums of one categorical value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub key: String,
    pub records: usize,
    pub hours: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct WarehouseCard {
    #[serde(rename = "Warehouse")]
    #[tabled(rename = "Warehouse")]
    pub warehouse: String,
    #[serde(rename = "Hours")]
    #[tabled(rename = "Hours")]
    pub hours: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "Amount")]
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct EmployeeAmountBar {
    #[tabled(rename = "Employee")]
    pub employee: String,
    #[tabled(rename = "Total amt.")]
    pub amount: f64,
    #[tabled(rename = "Highlight", display_with = "class_label")]
    pub class: HighlightClass,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct EmployeeHoursBar {
    #[tabled(rename = "Employee")]
    pub employee: String,
    #[tabled(rename = "Hours")]
    pub hours: f64,
    #[tabled(rename = "Warehouse")]
    pub warehouse: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct WarehouseCustomerBar {
    #[tabled(rename = "Warehouse")]
    pub warehouse: String,
    #[tabled(rename = "Customer")]
    pub customer: String,
    #[tabled(rename = "Total amt.")]
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ReasonCount {
    #[tabled(rename = "Reason")]
    pub reason: String,
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryMetrics {
    pub total_records: usize,
    pub total_hours: f64,
    pub total_amount: f64,
    pub hours_label: String,
    pub amount_label: String,
}

/// Everything the dashboard shows for one filtered view. `overall` covers
/// the whole upload; the rest follows the filters.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub overall: SummaryMetrics,
    pub summary: SummaryMetrics,
    pub warehouse_cards: Vec<WarehouseCard>,
    pub employee_amounts: Option<Vec<EmployeeAmountBar>>,
    pub employee_hours: Option<Vec<EmployeeHoursBar>>,
    pub warehouse_amounts: Vec<WarehouseCustomerBar>,
    pub reason_counts: Option<Vec<ReasonCount>>,
}

fn class_label(class: &HighlightClass) -> String {
    class.label().to_string()
}
