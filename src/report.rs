use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::dashboard::Dashboard;
use crate::format;
use crate::kpi::FORMULA_NOTES;
use crate::narrative::{self, money};
use crate::series::short_period_label;

pub const MISSING_HINT: &str =
    "Re-export the analysis tables into the data directory and run again.";

pub const MISSING_HEADING: &str = "Missing input files";
pub const MALFORMED_HEADING: &str = "Input files with unexpected columns";

fn file_list(heading: &str, files: &[String]) -> String {
    let mut output = format!("{heading}:");
    for name in files {
        let _ = write!(output, "\n- {name}");
    }
    output
}

/// One warning listing every missing input file.
pub fn missing_warning(missing: &[String]) -> String {
    file_list(MISSING_HEADING, missing)
}

/// One warning listing every present file whose columns did not match.
pub fn malformed_warning(malformed: &[String]) -> String {
    file_list(MALFORMED_HEADING, malformed)
}

/// The missing and malformed warnings that apply, each once.
pub fn input_warnings(dashboard: &Dashboard) -> Vec<String> {
    let mut warnings = Vec::new();
    if !dashboard.missing.is_empty() {
        warnings.push(missing_warning(&dashboard.missing));
    }
    if !dashboard.malformed.is_empty() {
        warnings.push(malformed_warning(&dashboard.malformed));
    }
    warnings
}

pub fn build_report(dashboard: &Dashboard, generated_at: NaiveDateTime) -> String {
    let mut output = String::new();
    let currency = dashboard.currency_label.as_str();

    let _ = writeln!(output, "# Subscription Revenue Dashboard");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M"));

    if !dashboard.is_complete() {
        let _ = writeln!(output);
        for warning in input_warnings(dashboard) {
            for line in warning.lines() {
                let _ = writeln!(output, "> {line}");
            }
            let _ = writeln!(output, ">");
        }
        let _ = writeln!(output, "> {MISSING_HINT}");
    }

    if let Some(kpis) = &dashboard.kpis {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Key Metrics");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|---|---|");
        let _ = writeln!(output, "| Conversion rate | {} |", format::percent(kpis.conversion_rate));
        let _ = writeln!(output, "| Mean retention | {} |", format::percent(kpis.retention_mean));
        let _ = writeln!(output, "| ARPU | {} |", money(kpis.arpu_overall, currency));
        let _ = writeln!(
            output,
            "| Average premium duration | {} |",
            format::months(kpis.avg_premium_duration)
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "How these are computed:");
        for (name, formula) in FORMULA_NOTES {
            let _ = writeln!(output, "- **{name}** = {formula}");
        }
    }

    if let Some(panel) = &dashboard.retention {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Premium Retention");
        if panel.points.is_empty() {
            let _ = writeln!(output, "No retention data.");
        } else {
            let _ = writeln!(output, "| Period | Retention |");
            let _ = writeln!(output, "|---|---|");
            for point in &panel.points {
                let _ = writeln!(
                    output,
                    "| {} | {} |",
                    short_period_label(&point.from_to),
                    format::optional(point.premium_retention, format::percent)
                );
            }
        }
        if let Some(peak) = &panel.peak {
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", narrative::retention_callout(peak));
        }
    }

    if let Some(panel) = &dashboard.arpu {
        let _ = writeln!(output);
        let _ = writeln!(output, "## ARPU by Month");
        if panel.points.is_empty() {
            let _ = writeln!(output, "No ARPU data.");
        } else {
            let _ = writeln!(output, "| Month | ARPU | Cumulative |");
            let _ = writeln!(output, "|---|---|---|");
            for (point, cumulative) in panel.points.iter().zip(&panel.cumulative) {
                let _ = writeln!(
                    output,
                    "| {} | {} | {} |",
                    point.month,
                    format::optional(point.arpu, |v| money(v, currency)),
                    format::optional(cumulative.cumulative_arpu, |v| money(v, currency))
                );
            }
        }
        if let Some(peak) = &panel.peak {
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", narrative::arpu_callout(peak, currency));
        }
    }

    if !dashboard.retention_vs_arpu.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Retention vs ARPU");
        let _ = writeln!(output, "| Month | Retention | ARPU |");
        let _ = writeln!(output, "|---|---|---|");
        for pair in &dashboard.retention_vs_arpu {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                pair.month,
                format::percent(pair.premium_retention),
                money(pair.arpu, currency)
            );
        }
    }

    if let Some(segments) = &dashboard.segments {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Average LTV by Segment (Top {})", dashboard.top_n);
        if segments.is_empty() {
            let _ = writeln!(output, "No segments with a numeric LTV.");
        } else {
            let _ = writeln!(
                output,
                "| Variable | Group | Users | Avg LTV | Avg premium duration | Avg monthly revenue | Free→Premium |"
            );
            let _ = writeln!(output, "|---|---|---|---|---|---|---|");
            for segment in segments {
                let _ = writeln!(
                    output,
                    "| {} | {} | {} | {} | {} | {} | {} |",
                    segment.variable,
                    segment.group_label(),
                    format::optional(segment.users, format::currency),
                    money(segment.avg_ltv, currency),
                    format::optional(segment.avg_premium_duration, format::months),
                    format::optional(segment.avg_monthly_revenue, |v| money(v, currency)),
                    format::optional(segment.free_to_premium_rate, format::percent),
                );
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", narrative::segment_callout(&segments[0], currency));
        }
    }

    if let Some(significant) = &dashboard.significant {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## Significant Factors (p < {})",
            dashboard.significance_level
        );
        if significant.is_empty() {
            let _ = writeln!(output, "No significant features.");
        } else {
            let _ = writeln!(output, "| Feature | Test | p-value |");
            let _ = writeln!(output, "|---|---|---|");
            for row in significant {
                let _ = writeln!(
                    output,
                    "| {} | {} | {} |",
                    row.feature,
                    row.test_type,
                    format::optional(row.p_value, format::p_value)
                );
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", narrative::significance_callout(&significant[0]));
        }
    }

    if let Some(importance) = &dashboard.importance {
        let _ = writeln!(output);
        let _ = writeln!(output, "## LTV Drivers (Feature Importance)");
        if importance.is_empty() {
            let _ = writeln!(output, "No feature importance data.");
        } else {
            let _ = writeln!(output, "| Feature | Importance |");
            let _ = writeln!(output, "|---|---|");
            for row in importance {
                let _ = writeln!(
                    output,
                    "| {} | {} |",
                    row.feature,
                    format::importance(row.importance)
                );
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", narrative::importance_callout(&importance[0]));
        }
    }

    if let Some(summary) = &dashboard.narrative {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Summary");
        for line in summary.lines() {
            let _ = writeln!(output, "- {line}");
        }
    }

    output
}
