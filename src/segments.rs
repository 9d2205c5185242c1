use log::warn;
use serde::Serialize;

use crate::models::SegmentRow;
use crate::ranking::{top_n_by, SortOrder};

/// Shown where a segment's group value cannot be resolved.
pub const GROUP_PLACEHOLDER: &str = "—";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub variable: String,
    pub group: Option<String>,
    pub users: Option<f64>,
    pub avg_ltv: f64,
    pub avg_premium_duration: Option<f64>,
    pub avg_monthly_revenue: Option<f64>,
    pub free_to_premium_rate: Option<f64>,
}

impl SegmentSummary {
    pub fn group_label(&self) -> &str {
        self.group.as_deref().unwrap_or(GROUP_PLACEHOLDER)
    }

    /// `variable = group`, used in chart labels and the narrative.
    pub fn label(&self) -> String {
        format!("{} = {}", self.variable, self.group_label())
    }
}

/// The row's value in the column named by its own `variable` field. `None`
/// when that column is absent or the cell is empty.
pub fn resolve_group(row: &SegmentRow) -> Option<String> {
    row.cells
        .get(&row.variable)
        .filter(|value| !value.is_empty())
        .cloned()
}

/// Rows with a numeric `avg_ltv`, highest first, at most `top_n`.
pub fn top_segments(rows: &[SegmentRow], top_n: usize) -> Vec<SegmentSummary> {
    let summaries: Vec<SegmentSummary> = rows
        .iter()
        .filter_map(|row| {
            let avg_ltv = row.avg_ltv?;
            let group = resolve_group(row);
            if group.is_none() {
                warn!("segment row for '{}' has no matching group column", row.variable);
            }
            Some(SegmentSummary {
                variable: row.variable.clone(),
                group,
                users: row.users,
                avg_ltv,
                avg_premium_duration: row.avg_premium_duration,
                avg_monthly_revenue: row.avg_monthly_revenue,
                free_to_premium_rate: row.free_to_premium_rate,
            })
        })
        .collect();

    top_n_by(summaries, SortOrder::Descending, top_n, |s| s.avg_ltv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn segment(variable: &str, cells: &[(&str, &str)], avg_ltv: Option<f64>) -> SegmentRow {
        let mut map: BTreeMap<String, String> = cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.insert("variable".to_string(), variable.to_string());
        SegmentRow {
            variable: variable.to_string(),
            cells: map,
            users: Some(10.0),
            avg_ltv,
            avg_premium_duration: None,
            avg_monthly_revenue: None,
            free_to_premium_rate: None,
        }
    }

    #[test]
    fn group_comes_from_column_named_by_variable() {
        let row = segment("genre", &[("genre", "Pop"), ("device", "")], Some(50000.0));
        assert_eq!(resolve_group(&row).as_deref(), Some("Pop"));

        let top = top_segments(&[row], 10);
        assert_eq!(top[0].group.as_deref(), Some("Pop"));
        assert_eq!(top[0].avg_ltv, 50000.0);
        assert_eq!(top[0].label(), "genre = Pop");
    }

    #[test]
    fn absent_column_becomes_placeholder() {
        let row = segment("mood", &[("genre", "Pop")], Some(1.0));
        assert_eq!(resolve_group(&row), None);
        let top = top_segments(&[row], 10);
        assert_eq!(top[0].group_label(), GROUP_PLACEHOLDER);
    }

    #[test]
    fn empty_cell_counts_as_unresolved() {
        let row = segment("device", &[("device", "")], Some(1.0));
        assert_eq!(resolve_group(&row), None);
    }

    #[test]
    fn rows_without_ltv_are_dropped_and_rest_ranked() {
        let rows = vec![
            segment("genre", &[("genre", "Pop")], Some(50000.0)),
            segment("genre", &[("genre", "Jazz")], None),
            segment("genre", &[("genre", "Rock")], Some(61000.0)),
        ];
        let top = top_segments(&rows, 10);
        let groups: Vec<_> = top.iter().map(|s| s.group_label()).collect();
        assert_eq!(groups, vec!["Rock", "Pop"]);
    }

    proptest! {
        #[test]
        fn resolved_group_matches_self_named_cell(
            variable in "[a-z]{1,8}",
            value in "[A-Za-z]{1,8}",
            other in "[a-z]{1,8}",
        ) {
            let row = segment(&variable, &[(&variable, &value), (&format!("{other}_x"), "noise")], Some(1.0));
            prop_assert_eq!(resolve_group(&row), row.cells.get(&variable).cloned());
        }

        #[test]
        fn top_segments_bounded_and_sorted(
            ltvs in proptest::collection::vec(0.0f64..1.0e6, 0..40),
            n in 1usize..15,
        ) {
            let rows: Vec<SegmentRow> = ltvs
                .iter()
                .map(|ltv| segment("genre", &[("genre", "Pop")], Some(*ltv)))
                .collect();
            let top = top_segments(&rows, n);
            prop_assert_eq!(top.len(), n.min(rows.len()));
            prop_assert!(top.windows(2).all(|w| w[0].avg_ltv >= w[1].avg_ltv));
        }
    }
}
