use crate::highlight::classify;
use crate::types::{
    Aggregate, Dashboard, Dataset, EmployeeAmountBar, EmployeeHoursBar, Field, FilterSelection,
    ReasonCount, Row, SummaryMetrics, WarehouseCard, WarehouseCustomerBar,
};
use crate::util::format_number;
use std::collections::HashMap;

/// Rows of a dataset matching a filter selection. Borrows the dataset and
/// only stores row indices, so building a view never copies or mutates data.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    pub fn columns(&self) -> &'a [String] {
        self.dataset.columns()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'a>> + '_ {
        self.indices.iter().filter_map(|&i| self.dataset.row(i))
    }

    /// Copy the matching rows into a standalone dataset with the same columns.
    pub fn to_dataset(&self) -> Dataset {
        Dataset::new(
            self.dataset.columns().to_vec(),
            self.rows().map(|r| r.record().clone()).collect(),
        )
    }
}

fn matches(row: &Row<'_>, selection: &FilterSelection) -> bool {
    selection.restrictions().iter().all(|(field, allowed)| {
        allowed.is_empty()
            || row
                .category(*field)
                .is_some_and(|value| allowed.contains(value.as_ref()))
    })
}

pub fn filter<'a>(dataset: &'a Dataset, selection: &FilterSelection) -> FilteredView<'a> {
    let indices = dataset
        .rows()
        .enumerate()
        .filter(|(_, row)| matches(row, selection))
        .map(|(i, _)| i)
        .collect();
    FilteredView { dataset, indices }
}

/// Distinct non-empty values of `field`, in first-seen order.
pub fn filter_options(dataset: &Dataset, field: Field) -> Vec<String> {
    let mut seen = Vec::new();
    for row in dataset.rows() {
        if let Some(value) = row.category(field) {
            if !seen.iter().any(|s: &String| s == value.as_ref()) {
                seen.push(value.into_owned());
            }
        }
    }
    seen
}

/// Group the view by `field` in first-seen order. Rows with an empty group
/// value are left out; empty numeric cells count as zero.
pub fn aggregate(view: &FilteredView<'_>, field: Field) -> Vec<Aggregate> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Aggregate> = Vec::new();
    for row in view.rows() {
        let Some(key) = row.category(field) else {
            continue;
        };
        let idx = match order.get(key.as_ref()) {
            Some(&idx) => idx,
            None => {
                order.insert(key.to_string(), groups.len());
                groups.push(Aggregate {
                    key: key.into_owned(),
                    records: 0,
                    hours: 0.0,
                    amount: 0.0,
                });
                groups.len() - 1
            }
        };
        let g = &mut groups[idx];
        g.records += 1;
        g.hours += row.hours().unwrap_or(0.0);
        g.amount += row.amount().unwrap_or(0.0);
    }
    groups
}

/// The whole view as one group.
pub fn summarize(view: &FilteredView<'_>) -> Aggregate {
    view.rows().fold(
        Aggregate {
            key: "Total".to_string(),
            records: 0,
            hours: 0.0,
            amount: 0.0,
        },
        |mut acc, row| {
            acc.records += 1;
            acc.hours += row.hours().unwrap_or(0.0);
            acc.amount += row.amount().unwrap_or(0.0);
            acc
        },
    )
}

pub fn summary_metrics(view: &FilteredView<'_>, currency: &str) -> SummaryMetrics {
    let total = summarize(view);
    SummaryMetrics {
        total_records: total.records,
        total_hours: total.hours,
        total_amount: total.amount,
        hours_label: format!("{:.1} hrs", total.hours),
        amount_label: format!("{}{}", currency, format_number(total.amount, 0)),
    }
}

pub fn warehouse_cards(view: &FilteredView<'_>, currency: &str) -> Vec<WarehouseCard> {
    aggregate(view, Field::Warehouse)
        .into_iter()
        .map(|g| WarehouseCard {
            warehouse: g.key,
            hours: format!("{:.1} hrs", g.hours),
            amount: format!("{}{}", currency, format_number(g.amount, 0)),
        })
        .collect()
}

/// One bar per row with an employee name and an amount, tagged with its
/// highlight class. `None` when the upload has no employee column.
pub fn employee_amounts(view: &FilteredView<'_>) -> Option<Vec<EmployeeAmountBar>> {
    if !view.dataset().has_column(Field::Employee) {
        return None;
    }
    let classes = classify(view);
    Some(
        view.rows()
            .zip(classes)
            .filter_map(|(row, class)| {
                Some(EmployeeAmountBar {
                    employee: row.category(Field::Employee)?.into_owned(),
                    amount: row.amount()?,
                    class,
                })
            })
            .collect(),
    )
}

pub fn employee_hours(view: &FilteredView<'_>) -> Option<Vec<EmployeeHoursBar>> {
    if !view.dataset().has_column(Field::Employee) {
        return None;
    }
    Some(
        view.rows()
            .filter_map(|row| {
                Some(EmployeeHoursBar {
                    employee: row.category(Field::Employee)?.into_owned(),
                    hours: row.hours()?,
                    warehouse: row
                        .category(Field::Warehouse)
                        .map(|w| w.into_owned())
                        .unwrap_or_default(),
                })
            })
            .collect(),
    )
}

/// Amount per (warehouse, customer) pair, first-seen order.
pub fn warehouse_amounts(view: &FilteredView<'_>) -> Vec<WarehouseCustomerBar> {
    let mut bars: Vec<WarehouseCustomerBar> = Vec::new();
    for row in view.rows() {
        let (Some(warehouse), Some(amount)) = (row.category(Field::Warehouse), row.amount()) else {
            continue;
        };
        let customer = row
            .category(Field::Customer)
            .map(|c| c.into_owned())
            .unwrap_or_default();
        match bars
            .iter_mut()
            .find(|b| b.warehouse == warehouse.as_ref() && b.customer == customer)
        {
            Some(bar) => bar.amount += amount,
            None => bars.push(WarehouseCustomerBar {
                warehouse: warehouse.into_owned(),
                customer,
                amount,
            }),
        }
    }
    bars
}

/// Reason frequencies, most frequent first; equal counts keep first-seen
/// order. `None` when the upload has no reasons column.
pub fn reason_counts(view: &FilteredView<'_>) -> Option<Vec<ReasonCount>> {
    if !view.dataset().has_column(Field::Reason) {
        return None;
    }
    let mut counts: Vec<ReasonCount> = Vec::new();
    for row in view.rows() {
        let Some(reason) = row.category(Field::Reason) else {
            continue;
        };
        match counts.iter_mut().find(|c| c.reason == reason.as_ref()) {
            Some(c) => c.count += 1,
            None => counts.push(ReasonCount {
                reason: reason.into_owned(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    Some(counts)
}

/// Headline metrics over the whole upload, whatever filters are active.
pub fn overall_metrics(data: &Dataset, currency: &str) -> SummaryMetrics {
    summary_metrics(&filter(data, &FilterSelection::default()), currency)
}

pub fn build_dashboard(view: &FilteredView<'_>, currency: &str) -> Dashboard {
    Dashboard {
        overall: overall_metrics(view.dataset(), currency),
        summary: summary_metrics(view, currency),
        warehouse_cards: warehouse_cards(view, currency),
        employee_amounts: employee_amounts(view),
        employee_hours: employee_hours(view),
        warehouse_amounts: warehouse_amounts(view),
        reason_counts: reason_counts(view),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, HighlightClass, Record};

    fn t(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn n(v: f64) -> CellValue {
        CellValue::Number(v)
    }

    fn sample() -> Dataset {
        let columns = [
            "Warehouse",
            "Customer",
            "Contractor Name",
            "Name of the Employee",
            "Duration of work",
            "Total amt.",
            "Remarks/Reasons",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let rows = vec![
            vec![t("WH2"), t("Acme"), t("K1"), t("Ravi"), n(10.0), n(6000.0), t("Peak")],
            vec![t("WH1"), t("Beta"), t("K2"), t("Asha"), n(4.0), n(1500.0), t("Audit")],
            vec![t("WH2"), t("Beta"), t("K1"), t("Omar"), CellValue::Empty, n(3000.0), t("Peak")],
            vec![CellValue::Empty, t("Acme"), t("K2"), t("Lina"), n(2.5), n(700.0), CellValue::Empty],
        ];
        Dataset::new(columns, rows.into_iter().map(|cells| Record { cells }).collect())
    }

    #[test]
    fn empty_selection_keeps_every_row() {
        let ds = sample();
        assert_eq!(filter(&ds, &FilterSelection::default()).len(), 4);
    }

    #[test]
    fn restrictions_combine_across_fields() {
        let ds = sample();
        let mut sel = FilterSelection::default();
        sel.warehouses.insert("WH2".into());
        assert_eq!(filter(&ds, &sel).len(), 2);
        sel.customers.insert("Beta".into());
        let view = filter(&ds, &sel);
        assert_eq!(view.len(), 1);
        assert_eq!(view.rows().next().unwrap().amount(), Some(3000.0));
    }

    #[test]
    fn unknown_value_matches_nothing() {
        let ds = sample();
        let mut sel = FilterSelection::default();
        sel.warehouses.insert("WH9".into());
        let view = filter(&ds, &sel);
        assert!(view.is_empty());
        let total = summarize(&view);
        assert_eq!((total.records, total.hours, total.amount), (0, 0.0, 0.0));
        assert!(aggregate(&view, Field::Warehouse).is_empty());
    }

    #[test]
    fn aggregate_uses_first_seen_order_and_skips_blank_keys() {
        let ds = sample();
        let view = filter(&ds, &FilterSelection::default());
        let groups = aggregate(&view, Field::Warehouse);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["WH2", "WH1"]);
        assert_eq!(groups[0].records, 2);
        assert_eq!(groups[0].hours, 10.0);
        assert_eq!(groups[0].amount, 9000.0);
    }

    #[test]
    fn filter_options_are_distinct_in_first_seen_order() {
        let ds = sample();
        assert_eq!(filter_options(&ds, Field::Warehouse), vec!["WH2", "WH1"]);
        assert_eq!(filter_options(&ds, Field::Contractor), vec!["K1", "K2"]);
    }

    #[test]
    fn dashboard_charts_follow_the_view() {
        let ds = sample();
        let view = filter(&ds, &FilterSelection::default());
        let dash = build_dashboard(&view, "₹");
        assert_eq!(dash.summary.total_records, 4);
        assert_eq!(dash.summary.hours_label, "16.5 hrs");
        assert_eq!(dash.summary.amount_label, "₹11,200");

        let amounts = dash.employee_amounts.unwrap();
        assert_eq!(amounts.len(), 4);
        assert!(amounts.iter().all(|b| b.class == HighlightClass::Top || b.employee == "Lina"));

        let hours = dash.employee_hours.unwrap();
        assert_eq!(hours.len(), 3);

        let reasons = dash.reason_counts.unwrap();
        assert_eq!(reasons[0].reason, "Peak");
        assert_eq!(reasons[0].count, 2);
        assert_eq!(reasons[1].reason, "Audit");

        assert_eq!(dash.warehouse_amounts.len(), 3);
    }

    #[test]
    fn headline_metrics_ignore_the_filters() {
        let ds = sample();
        let mut sel = FilterSelection::default();
        sel.warehouses.insert("WH1".into());
        let view = filter(&ds, &sel);
        let dash = build_dashboard(&view, "₹");
        assert_eq!(dash.overall.total_records, 4);
        assert_eq!(dash.overall.amount_label, "₹11,200");
        assert_eq!(dash.summary.total_records, 1);
        assert_eq!(dash.warehouse_cards.len(), 1);
        assert_eq!(dash.warehouse_cards[0].warehouse, "WH1");
    }

    #[test]
    fn hour_labels_have_no_thousands_separator() {
        let ds = Dataset::new(
            vec!["Warehouse".into(), "Duration of work".into()],
            vec![
                Record {
                    cells: vec![t("WH1"), n(1000.0)],
                },
                Record {
                    cells: vec![t("WH1"), n(234.5)],
                },
            ],
        );
        let view = filter(&ds, &FilterSelection::default());
        assert_eq!(summary_metrics(&view, "₹").hours_label, "1234.5 hrs");
        assert_eq!(warehouse_cards(&view, "₹")[0].hours, "1234.5 hrs");
    }

    #[test]
    fn employee_charts_absent_without_employee_column() {
        let ds = Dataset::new(
            vec!["Warehouse".into(), "Total amt.".into()],
            vec![Record {
                cells: vec![t("WH1"), n(10.0)],
            }],
        );
        let view = filter(&ds, &FilterSelection::default());
        assert!(employee_amounts(&view).is_none());
        assert!(employee_hours(&view).is_none());
        assert!(reason_counts(&view).is_none());
    }
}
