//! Self-contained HTML dashboard page.
//!
//! Charts are inline SVG and styling is embedded, so the page opens offline
//! straight from disk.

use std::fmt::Write;

use chrono::NaiveDateTime;

use crate::dashboard::{ArpuPanel, Dashboard, RetentionPanel};
use crate::format;
use crate::kpi::{KpiSnapshot, FORMULA_NOTES};
use crate::models::{FeatureImportance, SignificanceRow};
use crate::narrative::{self, money, Narrative};
use crate::report::{MALFORMED_HEADING, MISSING_HEADING, MISSING_HINT};
use crate::segments::SegmentSummary;
use crate::series::{short_period_label, CohortCell, RetentionArpuPair};

const LINE_COLOR: &str = "#1DB954";
const BAR_COLOR: &str = "#1DB954";
const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 260.0;

pub fn render_html(dashboard: &Dashboard, generated_at: NaiveDateTime) -> String {
    let mut sections = String::new();

    if !dashboard.missing.is_empty() {
        sections.push_str(&render_file_warning(MISSING_HEADING, &dashboard.missing));
    }
    if !dashboard.malformed.is_empty() {
        sections.push_str(&render_file_warning(MALFORMED_HEADING, &dashboard.malformed));
    }
    if let Some(kpis) = &dashboard.kpis {
        sections.push_str(&render_kpis(kpis, &dashboard.currency_label));
    }
    if let Some(panel) = &dashboard.retention {
        sections.push_str(&render_retention(panel));
    }
    if let Some(panel) = &dashboard.arpu {
        sections.push_str(&render_arpu(panel, &dashboard.currency_label));
    }
    if !dashboard.retention_vs_arpu.is_empty() {
        sections.push_str(&render_retention_vs_arpu(
            &dashboard.retention_vs_arpu,
            &dashboard.currency_label,
        ));
    }
    if let Some(segments) = &dashboard.segments {
        sections.push_str(&render_segments(
            segments,
            dashboard.top_n,
            &dashboard.currency_label,
        ));
    }
    if let Some(rows) = &dashboard.significant {
        sections.push_str(&render_significance(rows, dashboard.significance_level));
    }
    if let Some(rows) = &dashboard.importance {
        sections.push_str(&render_importance(rows));
    }
    if let Some(summary) = &dashboard.narrative {
        sections.push_str(&render_narrative(summary));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Subscription Revenue Dashboard</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        <header>
            <h1>Subscription Revenue Dashboard</h1>
            <p class="meta">Generated {generated}</p>
        </header>
        {sections}
    </div>
</body>
</html>"#,
        css = inline_css(),
        generated = generated_at.format("%Y-%m-%d %H:%M"),
        sections = sections,
    )
}

fn inline_css() -> &'static str {
    r#"
body { font-family: -apple-system, "Segoe UI", sans-serif; margin: 0; background: #fafafa; color: #222; }
.container { max-width: 1040px; margin: 0 auto; padding: 24px; }
.meta { color: #666; }
section { background: #fff; border: 1px solid #e5e5e5; border-radius: 8px; padding: 16px 20px; margin: 16px 0; }
.warning { background: #fff8e1; border-color: #f0c36d; }
.cards { display: grid; grid-template-columns: repeat(4, 1fr); gap: 12px; }
.card h3 { margin: 0; font-size: 0.9rem; color: #666; }
.card .value { font-size: 1.8rem; font-weight: 700; color: #1DB954; }
.callout { font-weight: 600; }
.empty { color: #888; font-style: italic; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 4px 8px; border-bottom: 1px solid #eee; }
svg { background: #fff; }
"#
}

fn render_file_warning(heading: &str, files: &[String]) -> String {
    let items: String = files
        .iter()
        .map(|file| format!("<li>{}</li>", html_escape(file)))
        .collect();
    format!(
        r#"<section class="warning">
    <h2>{heading}</h2>
    <ul>{items}</ul>
    <p>{hint}</p>
</section>"#,
        heading = html_escape(heading),
        items = items,
        hint = html_escape(MISSING_HINT),
    )
}

fn render_kpis(kpis: &KpiSnapshot, currency: &str) -> String {
    let cards = [
        ("Conversion rate", format::percent(kpis.conversion_rate)),
        ("Mean retention", format::percent(kpis.retention_mean)),
        ("ARPU", money(kpis.arpu_overall, currency)),
        ("Avg premium duration", format::months(kpis.avg_premium_duration)),
    ];
    let cards: String = cards
        .iter()
        .map(|(label, value)| {
            format!(
                r#"<div class="card"><h3>{}</h3><div class="value">{}</div></div>"#,
                html_escape(label),
                html_escape(value)
            )
        })
        .collect();
    let notes: String = FORMULA_NOTES
        .iter()
        .map(|(name, formula)| {
            format!(
                "<li><b>{}</b> = {}</li>",
                html_escape(name),
                html_escape(formula)
            )
        })
        .collect();
    format!(
        r#"<section>
    <h2>Key Metrics</h2>
    <div class="cards">{cards}</div>
    <details><summary>How these are computed</summary><ul>{notes}</ul></details>
</section>"#
    )
}

fn render_retention(panel: &RetentionPanel) -> String {
    let labels: Vec<String> = panel
        .points
        .iter()
        .map(|p| short_period_label(&p.from_to))
        .collect();
    let values: Vec<Option<f64>> = panel.points.iter().map(|p| p.premium_retention).collect();
    let chart = if panel.points.is_empty() {
        empty_note("No retention data.")
    } else {
        svg_line_chart(&labels, &values, Some(1.05), format::percent)
    };
    let peak_note = panel
        .peak
        .as_ref()
        .map(|peak| callout(&narrative::retention_callout(peak)))
        .unwrap_or_default();
    format!(
        r#"<section>
    <h2>Premium Retention</h2>
    {chart}
    {peak_note}
    {cohort}
</section>"#,
        cohort = render_cohort(&panel.cohort),
    )
}

fn render_cohort(cells: &[CohortCell]) -> String {
    if cells.is_empty() {
        return String::new();
    }
    let rows: String = cells
        .iter()
        .map(|cell| {
            format!(
                r#"<tr><td>{}</td><td>{}</td><td style="background: rgba(29,185,84,{:.2})">{}</td></tr>"#,
                html_escape(&cell.from),
                html_escape(&cell.to),
                cell.premium_retention.clamp(0.0, 1.0),
                format::percent(cell.premium_retention)
            )
        })
        .collect();
    format!(
        "<details><summary>Retention by month pair</summary><table><tr><th>From</th><th>To</th><th>Retention</th></tr>{rows}</table></details>"
    )
}

fn render_arpu(panel: &ArpuPanel, currency: &str) -> String {
    let labels: Vec<String> = panel.points.iter().map(|p| p.month.clone()).collect();
    let values: Vec<Option<f64>> = panel.points.iter().map(|p| p.arpu).collect();
    let cumulative: Vec<Option<f64>> = panel
        .cumulative
        .iter()
        .map(|p| p.cumulative_arpu)
        .collect();
    let (chart, cumulative_chart) = if panel.points.is_empty() {
        (empty_note("No ARPU data."), String::new())
    } else {
        (
            svg_line_chart(&labels, &values, None, |v| money(v, currency)),
            format!(
                "<details><summary>Cumulative ARPU</summary>{}</details>",
                svg_line_chart(&labels, &cumulative, None, |v| money(v, currency))
            ),
        )
    };
    let peak_note = panel
        .peak
        .as_ref()
        .map(|peak| callout(&narrative::arpu_callout(peak, currency)))
        .unwrap_or_default();
    format!(
        r#"<section>
    <h2>ARPU by Month</h2>
    {chart}
    {peak_note}
    {cumulative_chart}
</section>"#
    )
}

fn render_retention_vs_arpu(pairs: &[RetentionArpuPair], currency: &str) -> String {
    let points: Vec<(String, f64, f64)> = pairs
        .iter()
        .map(|pair| (pair.month.clone(), pair.premium_retention, pair.arpu))
        .collect();
    format!(
        r#"<section>
    <h2>Retention vs ARPU</h2>
    {chart}
</section>"#,
        chart = svg_scatter_chart(&points, format::percent, |v| money(v, currency)),
    )
}

fn render_segments(segments: &[SegmentSummary], top_n: usize, currency: &str) -> String {
    if segments.is_empty() {
        return format!(
            "<section><h2>Average LTV by Segment</h2>{}</section>",
            empty_note("No segments with a numeric LTV.")
        );
    }
    let labels: Vec<String> = segments.iter().map(SegmentSummary::label).collect();
    let values: Vec<f64> = segments.iter().map(|s| s.avg_ltv).collect();
    let rows: Vec<Vec<String>> = segments
        .iter()
        .map(|s| {
            vec![
                s.variable.clone(),
                s.group_label().to_string(),
                format::optional(s.users, format::currency),
                money(s.avg_ltv, currency),
                format::optional(s.avg_premium_duration, format::months),
                format::optional(s.avg_monthly_revenue, |v| money(v, currency)),
                format::optional(s.free_to_premium_rate, format::percent),
            ]
        })
        .collect();
    format!(
        r#"<section>
    <h2>Average LTV by Segment (Top {top_n})</h2>
    {chart}
    {callout}
    <details><summary>Segment table</summary>{table}</details>
</section>"#,
        chart = svg_bar_chart(&labels, &values, |v| money(v, currency)),
        callout = callout(&narrative::segment_callout(&segments[0], currency)),
        table = render_table(
            &[
                "Variable",
                "Group",
                "Users",
                "Avg LTV",
                "Avg premium duration",
                "Avg monthly revenue",
                "Free→Premium",
            ],
            &rows
        ),
    )
}

fn render_significance(rows: &[SignificanceRow], level: f64) -> String {
    let body = if rows.is_empty() {
        empty_note("No significant features.")
    } else {
        let table_rows: Vec<Vec<String>> = rows
            .iter()
            .map(|r| {
                vec![
                    r.feature.clone(),
                    r.test_type.clone(),
                    format::optional(r.p_value, format::p_value),
                ]
            })
            .collect();
        format!(
            "{}{}",
            render_table(&["Feature", "Test", "p-value"], &table_rows),
            callout(&narrative::significance_callout(&rows[0]))
        )
    };
    format!("<section><h2>Significant Factors (p &lt; {level})</h2>{body}</section>")
}

fn render_importance(rows: &[FeatureImportance]) -> String {
    let body = if rows.is_empty() {
        empty_note("No feature importance data.")
    } else {
        let labels: Vec<String> = rows.iter().map(|r| r.feature.clone()).collect();
        let values: Vec<f64> = rows.iter().map(|r| r.importance).collect();
        format!(
            "{}{}",
            svg_bar_chart(&labels, &values, format::importance),
            callout(&narrative::importance_callout(&rows[0]))
        )
    };
    format!("<section><h2>LTV Drivers (Feature Importance)</h2>{body}</section>")
}

fn render_narrative(summary: &Narrative) -> String {
    let items: String = summary
        .lines()
        .iter()
        .map(|line| format!("<li>{}</li>", html_escape(line)))
        .collect();
    format!("<section><h2>Summary</h2><ul>{items}</ul></section>")
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::from("<table><tr>");
    for header in headers {
        let _ = write!(out, "<th>{}</th>", html_escape(header));
    }
    out.push_str("</tr>");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", html_escape(cell));
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
    out
}

fn callout(text: &str) -> String {
    format!(r#"<p class="callout">{}</p>"#, html_escape(text))
}

fn empty_note(text: &str) -> String {
    format!(r#"<p class="empty">{}</p>"#, html_escape(text))
}

/// Line chart with one point per label; missing values break the line.
fn svg_line_chart<F>(labels: &[String], values: &[Option<f64>], y_max: Option<f64>, fmt: F) -> String
where
    F: Fn(f64) -> String,
{
    let left = 70.0;
    let right = 20.0;
    let top = 12.0;
    let bottom = 34.0;
    let plot_w = CHART_WIDTH - left - right;
    let plot_h = CHART_HEIGHT - top - bottom;

    let observed_max = values.iter().flatten().copied().fold(0.0, f64::max);
    let max_y = y_max.unwrap_or(observed_max * 1.1).max(f64::EPSILON);
    let step = if labels.len() > 1 {
        plot_w / (labels.len() - 1) as f64
    } else {
        0.0
    };
    let x_at = |i: usize| {
        if labels.len() > 1 {
            left + i as f64 * step
        } else {
            left + plot_w / 2.0
        }
    };
    let y_at = |v: f64| top + plot_h - (v / max_y).clamp(0.0, 1.0) * plot_h;

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" role="img">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = writeln!(
        out,
        r##"<rect x="{left}" y="{top}" width="{plot_w}" height="{plot_h}" fill="#fff" stroke="#ddd"/>"##
    );
    for tick in 0..=4 {
        let value = max_y * tick as f64 / 4.0;
        let y = y_at(value);
        let _ = writeln!(
            out,
            r##"<line x1="{left}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="#eee"/><text x="{tx}" y="{ty:.1}" font-size="10" text-anchor="end">{label}</text>"##,
            x2 = left + plot_w,
            tx = left - 6.0,
            ty = y + 3.0,
            label = html_escape(&fmt(value)),
        );
    }

    let mut segment: Vec<String> = Vec::new();
    let flush = |segment: &mut Vec<String>, out: &mut String| {
        if segment.len() > 1 {
            let _ = writeln!(
                out,
                r#"<polyline points="{}" fill="none" stroke="{LINE_COLOR}" stroke-width="2"/>"#,
                segment.join(" ")
            );
        }
        segment.clear();
    };
    for (i, value) in values.iter().enumerate() {
        match value {
            Some(v) => segment.push(format!("{:.1},{:.1}", x_at(i), y_at(*v))),
            None => flush(&mut segment, &mut out),
        }
    }
    flush(&mut segment, &mut out);

    for (i, (label, value)) in labels.iter().zip(values).enumerate() {
        let x = x_at(i);
        if let Some(v) = value {
            let _ = writeln!(
                out,
                r#"<circle cx="{x:.1}" cy="{cy:.1}" r="4" fill="{LINE_COLOR}"><title>{title}</title></circle>"#,
                cy = y_at(*v),
                title = html_escape(&format!("{label}: {}", fmt(*v))),
            );
        }
        let _ = writeln!(
            out,
            r#"<text x="{x:.1}" y="{y:.1}" font-size="10" text-anchor="middle">{}</text>"#,
            html_escape(label),
            y = top + plot_h + 16.0,
        );
    }
    out.push_str("</svg>");
    out
}

/// Labelled points with x and y scaled from zero to their observed maxima.
fn svg_scatter_chart<FX, FY>(points: &[(String, f64, f64)], fmt_x: FX, fmt_y: FY) -> String
where
    FX: Fn(f64) -> String,
    FY: Fn(f64) -> String,
{
    let left = 70.0;
    let right = 20.0;
    let top = 12.0;
    let bottom = 34.0;
    let plot_w = CHART_WIDTH - left - right;
    let plot_h = CHART_HEIGHT - top - bottom;

    let max_x = points.iter().map(|p| p.1).fold(0.0, f64::max).max(f64::EPSILON) * 1.05;
    let max_y = points.iter().map(|p| p.2).fold(0.0, f64::max).max(f64::EPSILON) * 1.1;
    let x_at = |v: f64| left + (v / max_x).clamp(0.0, 1.0) * plot_w;
    let y_at = |v: f64| top + plot_h - (v / max_y).clamp(0.0, 1.0) * plot_h;

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" role="img">"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    let _ = writeln!(
        out,
        r##"<rect x="{left}" y="{top}" width="{plot_w}" height="{plot_h}" fill="#fff" stroke="#ddd"/>"##
    );
    for tick in 0..=4 {
        let fraction = tick as f64 / 4.0;
        let _ = writeln!(
            out,
            r#"<text x="{tx}" y="{ty:.1}" font-size="10" text-anchor="end">{y_label}</text><text x="{xx:.1}" y="{xy:.1}" font-size="10" text-anchor="middle">{x_label}</text>"#,
            tx = left - 6.0,
            ty = y_at(max_y * fraction) + 3.0,
            y_label = html_escape(&fmt_y(max_y * fraction)),
            xx = x_at(max_x * fraction),
            xy = top + plot_h + 16.0,
            x_label = html_escape(&fmt_x(max_x * fraction)),
        );
    }
    for (label, x, y) in points {
        let _ = writeln!(
            out,
            r#"<circle cx="{cx:.1}" cy="{cy:.1}" r="5" fill="{LINE_COLOR}"><title>{title}</title></circle>"#,
            cx = x_at(*x),
            cy = y_at(*y),
            title = html_escape(&format!("{label}: {}, {}", fmt_x(*x), fmt_y(*y))),
        );
    }
    out.push_str("</svg>");
    out
}

/// Horizontal bars, first item on top.
fn svg_bar_chart<F>(labels: &[String], values: &[f64], fmt: F) -> String
where
    F: Fn(f64) -> String,
{
    let left = 200.0;
    let right = 90.0;
    let bar_h = 18.0;
    let gap = 6.0;
    let height = (labels.len() as f64) * (bar_h + gap) + gap;
    let plot_w = CHART_WIDTH - left - right;
    let max = values.iter().copied().fold(0.0, f64::max).max(f64::EPSILON);

    let mut out = String::new();
    let _ = writeln!(
        out,
        r#"<svg width="{w}" height="{height}" viewBox="0 0 {w} {height}" role="img">"#,
        w = CHART_WIDTH
    );
    for (i, (label, value)) in labels.iter().zip(values).enumerate() {
        let y = gap + i as f64 * (bar_h + gap);
        let width = (value / max).clamp(0.0, 1.0) * plot_w;
        let _ = writeln!(
            out,
            r#"<text x="{tx}" y="{ty:.1}" font-size="11" text-anchor="end">{label}</text><rect x="{left}" y="{y:.1}" width="{width:.1}" height="{bar_h}" fill="{BAR_COLOR}"/><text x="{vx:.1}" y="{ty:.1}" font-size="11">{value}</text>"#,
            tx = left - 6.0,
            ty = y + bar_h - 5.0,
            label = html_escape(label),
            vx = left + width + 6.0,
            value = html_escape(&fmt(*value)),
        );
    }
    out.push_str("</svg>");
    out
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppContext;
    use crate::dashboard;
    use crate::loader::tests::{config_for, write_all};
    use crate::loader::{self, Dataset};
    use chrono::NaiveDate;

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn render_dir(dir: &std::path::Path) -> String {
        let mut ctx = AppContext::new(config_for(dir));
        let inputs = loader::load_inputs(&mut ctx).unwrap();
        let dashboard = dashboard::build(&inputs, &ctx.config).unwrap();
        render_html(&dashboard, generated_at())
    }

    fn render(skip: &[Dataset]) -> String {
        let dir = tempfile::tempdir().unwrap();
        write_all(dir.path(), &config_for(dir.path()), skip);
        render_dir(dir.path())
    }

    #[test]
    fn page_is_self_contained_with_charts() {
        let page = render(&[]);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<style>"));
        assert!(!page.contains("<script src"));
        assert!(page.contains("<polyline"));
        assert!(page.contains("Best retention period: 2023-01→2023-02 = 80.0%"));
        assert!(page.contains("genre = Rock"));
        assert!(page.contains("<h2>Summary</h2>"));
        assert!(!page.contains("Missing input files"));
    }

    #[test]
    fn missing_files_render_as_one_warning() {
        let page = render(&[Dataset::RevenueKpis, Dataset::PrefGroupSummary]);
        assert_eq!(page.matches("<section class=\"warning\">").count(), 1);
        assert!(page.contains("<li>out_revenue_kpis.csv</li><li>out_pref_group_summary.csv</li>"));
        assert!(!page.contains("Key Metrics"));
        assert!(!page.contains("Average LTV by Segment"));
        assert!(page.contains("Premium Retention"));
    }

    #[test]
    fn retention_is_plotted_against_arpu() {
        let page = render(&[]);
        let start = page.find("<h2>Retention vs ARPU</h2>").unwrap();
        let section = &page[start..page[start..].find("</section>").unwrap() + start];
        assert_eq!(section.matches("<circle").count(), 2);
        assert!(section.contains("2023-02: 80.0%, ₩4,100"));
    }

    #[test]
    fn retention_vs_arpu_needs_both_series() {
        let page = render(&[Dataset::ArpuMonthly]);
        assert!(!page.contains("Retention vs ARPU"));
    }

    #[test]
    fn malformed_table_is_flagged_and_panel_left_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        write_all(dir.path(), &config, &[]);
        std::fs::write(
            dir.path().join(Dataset::PrefSignificanceTests.file_name(&config)),
            "feature,pvalue\ngenre,0.0004\n",
        )
        .unwrap();
        let page = render_dir(dir.path());

        assert!(page.contains("<h2>Input files with unexpected columns</h2>"));
        assert!(page.contains("<li>out_pref_significance_tests.csv</li>"));
        assert!(!page.contains("Missing input files"));
        assert!(page.contains("No significant features."));
        assert!(page.contains("Key Metrics"));
        assert!(!page.contains("<h2>Summary</h2>"));
    }

    #[test]
    fn gaps_split_the_line() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let svg = svg_line_chart(
            &labels,
            &[Some(1.0), Some(2.0), None, Some(3.0)],
            None,
            |v| v.to_string(),
        );
        assert_eq!(svg.matches("<polyline").count(), 1);
        assert_eq!(svg.matches("<circle").count(), 3);
    }

    #[test]
    fn labels_are_escaped() {
        let svg = svg_bar_chart(&["a<b".to_string()], &[1.0], |v| v.to_string());
        assert!(svg.contains("a&lt;b"));
        assert!(!svg.contains("a<b"));
    }
}
