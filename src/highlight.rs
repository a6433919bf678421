// Per-row emphasis tiers for the current filtered view.
//
// The tiers are recomputed from whatever view is passed in, so the Top set
// follows the active filters rather than the full dataset.
use crate::reports::FilteredView;
use crate::types::{HighlightClass, HIGH_AMOUNT_THRESHOLD, LONG_DURATION_HOURS, TOP_N};
use std::cmp::Ordering;

/// Amounts of the `TOP_N` largest rows, largest first. Duplicates are kept,
/// so two rows sharing the maximum take two of the slots.
pub fn top_amounts(view: &FilteredView<'_>) -> Vec<f64> {
    let mut amounts: Vec<f64> = view.rows().filter_map(|r| r.amount()).collect();
    amounts.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    amounts.truncate(TOP_N);
    amounts
}

pub fn classify_amount(amount: Option<f64>, top: &[f64]) -> HighlightClass {
    match amount {
        Some(v) if top.contains(&v) => HighlightClass::Top,
        Some(v) if v >= HIGH_AMOUNT_THRESHOLD => HighlightClass::High,
        _ => HighlightClass::Normal,
    }
}

/// One class per row of `view`, in view order. Membership in the Top tier
/// is by value: every row whose amount equals one of the top amounts is Top,
/// which can exceed `TOP_N` rows when amounts tie.
pub fn classify(view: &FilteredView<'_>) -> Vec<HighlightClass> {
    let top = top_amounts(view);
    view.rows()
        .map(|row| classify_amount(row.amount(), &top))
        .collect()
}

pub fn is_long_duration(hours: Option<f64>) -> bool {
    hours.is_some_and(|h| h >= LONG_DURATION_HOURS)
}
