use serde::Serialize;

use crate::format;
use crate::kpi::KpiSnapshot;
use crate::models::{FeatureImportance, SignificanceRow};
use crate::segments::SegmentSummary;
use crate::series::Peak;

pub fn money(value: f64, currency_label: &str) -> String {
    format!("{currency_label}{}", format::currency(value))
}

pub fn retention_callout(peak: &Peak) -> String {
    format!(
        "Best retention period: {} = {}",
        peak.label,
        format::percent(peak.value)
    )
}

pub fn arpu_callout(peak: &Peak, currency_label: &str) -> String {
    format!(
        "Best ARPU month: {} = {}",
        peak.label,
        money(peak.value, currency_label)
    )
}

pub fn segment_callout(top: &SegmentSummary, currency_label: &str) -> String {
    format!(
        "Top segment: {}, average LTV {}",
        top.label(),
        money(top.avg_ltv, currency_label)
    )
}

pub fn significance_callout(top: &SignificanceRow) -> String {
    let p = format::optional(top.p_value, format::p_value);
    if top.test_type.is_empty() {
        format!("Most significant: {}, p={}", top.feature, p)
    } else {
        format!("Most significant: {} ({}), p={}", top.feature, top.test_type, p)
    }
}

pub fn importance_callout(top: &FeatureImportance) -> String {
    format!(
        "Strongest LTV driver: {} (importance {})",
        top.feature,
        format::importance(top.importance)
    )
}

/// The closing summary block, one line per theme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    pub kpi_line: String,
    pub peaks_line: String,
    pub leaders_line: String,
}

impl Narrative {
    pub fn compose(
        kpis: &KpiSnapshot,
        retention_peak: Option<&Peak>,
        arpu_peak: Option<&Peak>,
        top_segment: Option<&SegmentSummary>,
        top_feature: Option<&FeatureImportance>,
        currency_label: &str,
    ) -> Self {
        let kpi_line = format!(
            "Conversion {}, mean retention {}, ARPU {}, average premium duration {}",
            format::percent(kpis.conversion_rate),
            format::percent(kpis.retention_mean),
            money(kpis.arpu_overall, currency_label),
            format::months(kpis.avg_premium_duration),
        );
        let peaks_line = format!(
            "Retention peak: {}, ARPU peak: {}",
            retention_peak
                .map(|p| format!("{} ({})", p.label, format::percent(p.value)))
                .unwrap_or_else(|| format::NOT_AVAILABLE.to_string()),
            arpu_peak
                .map(|p| format!("{} ({})", p.label, money(p.value, currency_label)))
                .unwrap_or_else(|| format::NOT_AVAILABLE.to_string()),
        );
        let leaders_line = format!(
            "Top LTV segment: {}, strongest LTV driver: {}",
            top_segment
                .map(SegmentSummary::label)
                .unwrap_or_else(|| format::NOT_AVAILABLE.to_string()),
            top_feature
                .map(|f| f.feature.clone())
                .unwrap_or_else(|| format::NOT_AVAILABLE.to_string()),
        );
        Self {
            kpi_line,
            peaks_line,
            leaders_line,
        }
    }

    pub fn lines(&self) -> [&str; 3] {
        [&self.kpi_line, &self.peaks_line, &self.leaders_line]
    }
}
