use serde::Serialize;

use crate::error::DashboardError;
use crate::models::KpiRow;

pub const CONVERSION_RATE: &str = "conversion_rate";
pub const RETENTION_MEAN: &str = "premium_retention_mean";
pub const ARPU_OVERALL: &str = "arpu_overall";
pub const AVG_PREMIUM_DURATION: &str = "avg_premium_duration";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub conversion_rate: f64,
    pub retention_mean: f64,
    pub arpu_overall: f64,
    pub avg_premium_duration: f64,
}

/// Exact-match lookup on `metric`. Exactly one row with a numeric value must match.
pub fn lookup_metric(rows: &[KpiRow], metric: &str) -> Result<f64, DashboardError> {
    let mut matches = rows.iter().filter(|row| row.metric == metric);
    let first = matches.next().ok_or_else(|| DashboardError::MetricNotFound {
        metric: metric.to_string(),
    })?;
    let extra = matches.count();
    if extra > 0 {
        return Err(DashboardError::MetricAmbiguous {
            metric: metric.to_string(),
            matches: extra + 1,
        });
    }
    first.value.ok_or_else(|| DashboardError::MetricNotFound {
        metric: metric.to_string(),
    })
}

pub fn extract_kpis(rows: &[KpiRow]) -> Result<KpiSnapshot, DashboardError> {
    Ok(KpiSnapshot {
        conversion_rate: lookup_metric(rows, CONVERSION_RATE)?,
        retention_mean: lookup_metric(rows, RETENTION_MEAN)?,
        arpu_overall: lookup_metric(rows, ARPU_OVERALL)?,
        avg_premium_duration: lookup_metric(rows, AVG_PREMIUM_DURATION)?,
    })
}

/// How each KPI is derived upstream, shown beside the KPI cards.
pub const FORMULA_NOTES: [(&str, &str); 5] = [
    ("Conversion rate", "premium conversions / users who started on Free"),
    ("Retention (A→B)", "users Premium in both A and B / Premium users in A"),
    ("ARPU", "total revenue / user-months"),
    ("Average premium duration", "mean number of Premium months per user"),
    ("LTV (per user)", "sum of revenue per user, averaged within a segment"),
];
