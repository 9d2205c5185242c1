//! Retention and ARPU time series: peak callouts and the derived views
//! (cumulative ARPU, retention against ARPU, from/to cohort grid).

use serde::Serialize;

use crate::models::{ArpuPoint, RetentionPoint};
use crate::ranking::argmax;

pub const PERIOD_SEPARATOR: char = '→';

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub label: String,
    pub value: f64,
}

pub fn retention_peak(points: &[RetentionPoint]) -> Option<Peak> {
    let idx = argmax(points.iter().map(|p| p.premium_retention))?;
    let point = &points[idx];
    Some(Peak {
        label: point.from_to.clone(),
        value: point.premium_retention?,
    })
}

pub fn arpu_peak(points: &[ArpuPoint]) -> Option<Peak> {
    let idx = argmax(points.iter().map(|p| p.arpu))?;
    let point = &points[idx];
    Some(Peak {
        label: point.month.clone(),
        value: point.arpu?,
    })
}

/// Splits `"2023-01→2023-02"` into its trimmed halves.
pub fn split_period(from_to: &str) -> Option<(&str, &str)> {
    from_to
        .split_once(PERIOD_SEPARATOR)
        .map(|(from, to)| (from.trim(), to.trim()))
}

fn last_two(s: &str) -> &str {
    let start = s
        .char_indices()
        .rev()
        .nth(1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    &s[start..]
}

/// Tick label: `"2023-01→2023-02"` becomes `"01→02"`.
pub fn short_period_label(from_to: &str) -> String {
    match split_period(from_to) {
        Some((from, to)) => format!("{}{}{}", last_two(from), PERIOD_SEPARATOR, last_two(to)),
        None => from_to.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub month: String,
    pub cumulative_arpu: Option<f64>,
}

/// Running ARPU total. A month without ARPU has no total of its own; later
/// months keep adding to the sum.
pub fn cumulative_arpu(points: &[ArpuPoint]) -> Vec<CumulativePoint> {
    let mut total = 0.0;
    points
        .iter()
        .map(|point| CumulativePoint {
            month: point.month.clone(),
            cumulative_arpu: point.arpu.map(|arpu| {
                total += arpu;
                total
            }),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionArpuPair {
    pub month: String,
    pub premium_retention: f64,
    pub arpu: f64,
}

/// Joins each retention transition to the ARPU of its target month.
pub fn retention_vs_arpu(
    retention: &[RetentionPoint],
    arpu: &[ArpuPoint],
) -> Vec<RetentionArpuPair> {
    retention
        .iter()
        .filter_map(|point| {
            let (_, to) = split_period(&point.from_to)?;
            let premium_retention = point.premium_retention?;
            let arpu = arpu
                .iter()
                .find(|a| a.month.trim() == to)
                .and_then(|a| a.arpu)?;
            Some(RetentionArpuPair {
                month: to.to_string(),
                premium_retention,
                arpu,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortCell {
    pub from: String,
    pub to: String,
    pub premium_retention: f64,
}

pub fn cohort_grid(points: &[RetentionPoint]) -> Vec<CohortCell> {
    points
        .iter()
        .filter_map(|point| {
            let (from, to) = split_period(&point.from_to)?;
            Some(CohortCell {
                from: last_two(from).to_string(),
                to: last_two(to).to_string(),
                premium_retention: point.premium_retention?,
            })
        })
        .collect()
}
